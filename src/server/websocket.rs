use crate::agent::SupportAgent;
use crate::cli::Args;
use crate::conversation::{ ConversationSession, SessionEvent };
use crate::language::LanguageCode;
use crate::models::websocket::{ ClientMessage, ServerMessage };

use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::io::{ AsyncRead, AsyncWrite };
use tokio::sync::mpsc;

use tokio_tungstenite::{ accept_hdr_async, WebSocketStream };
use tokio_tungstenite::tungstenite::handshake::server::{ ErrorResponse, Request, Response };
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_rustls::TlsAcceptor;

use rustls::ServerConfig;
use rustls::pki_types::{ CertificateDer, PrivateKeyDer };
use rustls_pemfile::{ certs, pkcs8_private_keys };

use lazy_static::lazy_static;
use governor::{ RateLimiter, Quota, state::{ InMemoryState, NotKeyed }, clock::DefaultClock };
use url::form_urlencoded;

use log::{ info, warn, error, debug };
use futures::{ SinkExt, StreamExt };
use uuid::Uuid;

/// Recorded voice arrives inline as a data URI, hence the generous limit.
const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(Quota::per_second(NonZeroU32::MIN.saturating_add(9)));
}

pub(crate) fn load_tls_config(
    cert_path: &str,
    key_path: &str
) -> Result<Arc<ServerConfig>, Box<dyn Error + Send + Sync>> {
    let cert_file = File::open(cert_path).map_err(|e|
        format!("Failed to open TLS certificate file '{}': {}", cert_path, e)
    )?;
    let key_file = File::open(key_path).map_err(|e|
        format!("Failed to open TLS key file '{}': {}", key_path, e)
    )?;

    let mut cert_reader = BufReader::new(cert_file);
    let mut key_reader = BufReader::new(key_file);
    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| format!("Failed to read certificate(s): {}", e))?;

    let key = match pkcs8_private_keys(&mut key_reader).next() {
        Some(Ok(k)) => PrivateKeyDer::Pkcs8(k),
        Some(Err(e)) => {
            return Err(format!("Error reading private key: {}", e).into());
        }
        None => {
            return Err("No PKCS8 private key found in key file".into());
        }
    };

    let config = ServerConfig::builder().with_no_client_auth().with_single_cert(cert_chain, key)?;
    Ok(Arc::new(config))
}

pub async fn start_ws_server(
    addr: &str,
    agent: Arc<SupportAgent>,
    api_key: Option<String>,
    args: Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    let protocol = if args.tls_enabled() { "wss" } else { "ws" };
    info!("{} server listening on: {}", protocol.to_uppercase(), addr);

    let tls_acceptor = if args.enable_tls {
        match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert_path), Some(key_path)) => {
                info!(
                    "TLS enabled. Loading certificate from '{}' and key from '{}'",
                    cert_path,
                    key_path
                );
                let config = load_tls_config(cert_path, key_path)?;
                Some(TlsAcceptor::from(config))
            }
            (Some(_), None) | (None, Some(_)) => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                return Err("Missing TLS certificate or key path".into());
            }
            (None, None) => {
                error!("--enable-tls was set but no certificate/key paths provided.");
                return Err("TLS enabled without cert/key".into());
            }
        }
    } else {
        info!("TLS not enabled. Running plain WebSocket (WS) server.");
        None
    };

    let default_language = args.default_language;

    loop {
        let (stream, peer) = listener.accept().await?;

        if CONNECTION_LIMITER.check().is_err() {
            warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
            continue;
        }

        info!("Incoming connection from: {}", peer);
        let agent_clone = Arc::clone(&agent);
        let required_api_key = api_key.clone();
        let tls_acceptor_clone = tls_acceptor.clone();

        tokio::spawn(async move {
            let process_result = if let Some(acceptor) = tls_acceptor_clone {
                match acceptor.accept(stream).await {
                    Ok(tls_stream) => {
                        info!("TLS handshake successful for {}", peer);
                        process_connection(
                            peer,
                            tls_stream,
                            agent_clone,
                            required_api_key,
                            default_language
                        ).await
                    }
                    Err(e) => {
                        error!("TLS handshake error for {}: {}", peer, e);
                        Err(Box::new(e) as Box<dyn Error + Send + Sync>)
                    }
                }
            } else {
                process_connection(peer, stream, agent_clone, required_api_key, default_language).await
            };

            if let Err(e) = process_result {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

/// Key from the `X-API-Key` header, or the `api_key` query parameter.
fn provided_api_key(req: &Request) -> Option<String> {
    req.headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .or_else(|| {
            let query = req.uri().query().unwrap_or("");
            form_urlencoded
                ::parse(query.as_bytes())
                .find(|(k, _)| k == "api_key")
                .map(|(_, v)| v.into_owned())
        })
}

fn unauthorized() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some("Unauthorized".to_string()));
    *response.status_mut() = StatusCode::UNAUTHORIZED;
    response
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    agent: Arc<SupportAgent>,
    required_api_key: Option<String>,
    default_language: LanguageCode
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let auth_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let Some(required) = &required_api_key else {
            debug!("{} no API key required", peer);
            return Ok(response);
        };
        if provided_api_key(req).as_deref() != Some(required.as_str()) {
            warn!("{}: bad or missing API key", peer);
            return Err(unauthorized());
        }
        info!("{} authenticated", peer);
        Ok(response)
    };

    match accept_hdr_async(stream, auth_callback).await {
        Ok(ws) => {
            handle_connection(peer, ws, agent, default_language).await;
            Ok(())
        }
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(Box::new(e) as _)
        }
    }
}

/// Session events the client renders. Recording and playback stay server-side.
fn to_server_message(event: SessionEvent) -> Option<ServerMessage> {
    match event {
        SessionEvent::Welcome(message) => Some(ServerMessage::Welcome { message }),
        SessionEvent::MessageAppended(message) => Some(ServerMessage::Message { message }),
        SessionEvent::AudioAttached { id, audio_data_uri } =>
            Some(ServerMessage::Audio { id, audio_data_uri }),
        SessionEvent::Typing(true) => Some(ServerMessage::Typing),
        SessionEvent::Transcription(text) => Some(ServerMessage::Transcription { text }),
        SessionEvent::Notice(notice) => Some(notice.into()),
        _ => None,
    }
}

pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    agent: Arc<SupportAgent>,
    default_language: LanguageCode
)
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let (mut tx, mut rx) = websocket.split();
    let conversation_id = Uuid::new_v4().to_string();
    info!("Assigned conversation ID {} to {}", conversation_id, peer);

    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let writer = tokio::spawn(async move {
        while let Some(server_message) = outbox_rx.recv().await {
            let json = match serde_json::to_string(&server_message) {
                Ok(json) => json,
                Err(e) => {
                    error!("Failed to serialize message for {}: {}", peer, e);
                    continue;
                }
            };
            if tx.send(Message::Text(json)).await.is_err() {
                error!("Failed to send message to {}", peer);
                break;
            }
        }
    });

    let (mut session, mut session_events) = ConversationSession::new(agent, default_language);
    let forward_outbox = outbox.clone();
    let forwarder = tokio::spawn(async move {
        while let Some(event) = session_events.recv().await {
            if let Some(server_message) = to_server_message(event) {
                if forward_outbox.send(server_message).is_err() {
                    break;
                }
            }
        }
    });

    session.start().await;

    while let Some(msg) = rx.next().await {
        let message = match msg {
            Ok(message) => message,
            Err(e) => {
                error!("Error receiving message from {}: {}", peer, e);
                break;
            }
        };

        if message.len() > MAX_MESSAGE_SIZE {
            warn!(
                "Message from {} exceeds size limit ({} > {})",
                peer,
                message.len(),
                MAX_MESSAGE_SIZE
            );
            let _ = outbox.send(ServerMessage::Error { message: "Message too large".to_string() });
            break;
        }

        match message {
            Message::Text(text) => {
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Chat { content }) => {
                        if session.submit_message(&content).await.is_none() {
                            debug!("Ignoring empty chat message from {}", peer);
                        }
                    }
                    Ok(ClientMessage::Voice { audio_data_uri, language }) => {
                        session.transcribe_audio(&audio_data_uri, language).await;
                    }
                    Ok(ClientMessage::SetLanguage { language }) => {
                        session.set_voice_language(language);
                    }
                    Err(e) => {
                        warn!("Invalid message from {}: {}", peer, e);
                        let _ = outbox.send(ServerMessage::Error {
                            message: format!("Invalid message format: {}", e),
                        });
                    }
                }
            }
            Message::Close(_) => {
                info!("Client {} closed connection", peer);
                break;
            }
            Message::Binary(_) => {
                let _ = outbox.send(ServerMessage::Error {
                    message: "Binary frames are not supported".to_string(),
                });
            }
            _ => {}
        }
    }

    drop(session);
    let _ = forwarder.await;
    drop(outbox);
    let _ = writer.await;
    info!("Connection {} ({}) closed", conversation_id, peer);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::Message as ChatMessage;
    use crate::models::notice::Notice;

    #[test]
    fn test_session_events_mapping() {
        let welcome = ChatMessage::bot("Hi", LanguageCode::English);
        assert!(matches!(
            to_server_message(SessionEvent::Welcome(welcome)),
            Some(ServerMessage::Welcome { .. })
        ));
        assert_eq!(to_server_message(SessionEvent::Typing(true)), Some(ServerMessage::Typing));
        assert_eq!(to_server_message(SessionEvent::Typing(false)), None);
        assert_eq!(to_server_message(SessionEvent::Recording(true)), None);
        assert!(matches!(
            to_server_message(SessionEvent::Notice(Notice::info("a", "b"))),
            Some(ServerMessage::Notice { .. })
        ));
    }

    #[test]
    fn test_api_key_from_query() {
        let req = Request::builder()
            .uri("ws://localhost:4000/?api_key=s%3Dcret&x=1")
            .body(())
            .unwrap();
        assert_eq!(provided_api_key(&req), Some("s=cret".to_string()));

        let req = Request::builder()
            .uri("ws://localhost:4000/")
            .header("X-API-Key", "abc")
            .body(())
            .unwrap();
        assert_eq!(provided_api_key(&req), Some("abc".to_string()));
    }
}
