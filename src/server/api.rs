use crate::agent::{ ReplySource, SupportAgent };
use crate::cli::Args;
use crate::knowledge::pincode::{ is_valid_pin_code, normalize_digits };
use crate::language::LanguageCode;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    routing::{ get, post },
    Router,
    Json,
    extract::{ Path, Query, State },
    response::{ IntoResponse, Response },
    http::StatusCode,
};
use serde::{ Deserialize, Serialize };
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, error };

#[derive(Deserialize)]
pub struct GenerateRequest {
    pub text: String,
    #[serde(default)]
    pub language: LanguageCode,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct GenerateResponse {
    pub response_text: String,
}

#[derive(Deserialize)]
pub struct ReplyRequest {
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ReplyResponse {
    pub response_text: String,
    pub language: LanguageCode,
    pub source: ReplySource,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscribeRequest {
    pub audio_data_uri: String,
    #[serde(default)]
    pub language: LanguageCode,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TranscribeResponse {
    pub transcription: String,
}

#[derive(Deserialize)]
pub struct SpeechRequest {
    pub text: String,
    #[serde(default)]
    pub language: LanguageCode,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SpeechResponse {
    pub audio_data_uri: String,
}

#[derive(Deserialize)]
pub struct PinCodeQuery {
    #[serde(default)]
    pub language: LanguageCode,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PinCodeResponse {
    pub pin_code: String,
    pub serviceable: bool,
    pub message: String,
}

#[derive(Serialize)]
struct ReloadResponse {
    success: bool,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: error.into() })).into_response()
}

#[derive(Clone)]
struct AppState {
    agent: Arc<SupportAgent>,
}

pub fn router(agent: Arc<SupportAgent>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/generate", post(generate_handler))
        .route("/api/reply", post(reply_handler))
        .route("/api/transcribe", post(transcribe_handler))
        .route("/api/speech", post(speech_handler))
        .route("/api/pincode/{pin}", get(pincode_handler))
        .route("/api/reload-prompts", get(reload_prompts_handler))
        .layer(cors)
        .with_state(AppState { agent })
}

pub async fn start_http_server(
    http_addr: &str,
    agent: Arc<SupportAgent>,
    args: Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = http_addr.parse::<SocketAddr>()?;
    let app = router(agent);

    if args.tls_enabled() {
        let (Some(cert_path), Some(key_path)) = (&args.tls_cert_path, &args.tls_key_path) else {
            return Err("TLS enabled without cert/key".into());
        };
        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            cert_path,
            key_path
        ).await?;
        info!("Starting HTTPS API server on: https://{}", addr);

        tokio::spawn(async move {
            let result = axum_server::bind_rustls(addr, tls_config)
                .serve(app.into_make_service())
                .await;

            if let Err(e) = result {
                error!("HTTPS server error: {}", e);
            }
        });
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e|
            format!("Failed to bind HTTP server to {}: {}", addr, e)
        )?;
        info!("Starting HTTP API server on: http://{}", addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app.into_make_service()).await {
                error!("HTTP server error: {}", e);
            }
        });
    }

    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn generate_handler(
    State(state): State<AppState>,
    Json(req): Json<GenerateRequest>
) -> Response {
    let reply = state.agent.generate(&req.text, req.language).await;
    Json(GenerateResponse { response_text: reply.text }).into_response()
}

async fn reply_handler(State(state): State<AppState>, Json(req): Json<ReplyRequest>) -> Response {
    if req.text.trim().is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "text must not be empty");
    }
    let resolution = state.agent.resolve_reply(&req.text).await;
    Json(ReplyResponse {
        response_text: resolution.text,
        language: resolution.language,
        source: resolution.source,
    }).into_response()
}

async fn transcribe_handler(
    State(state): State<AppState>,
    Json(req): Json<TranscribeRequest>
) -> Response {
    match state.agent.transcribe(&req.audio_data_uri, req.language).await {
        Ok(transcription) => Json(TranscribeResponse { transcription }).into_response(),
        Err(e) => {
            error!("Transcription request failed: {}", e);
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

async fn speech_handler(State(state): State<AppState>, Json(req): Json<SpeechRequest>) -> Response {
    match state.agent.synthesize(&req.text, req.language).await {
        Ok(audio_data_uri) => Json(SpeechResponse { audio_data_uri }).into_response(),
        Err(e) => {
            error!("Speech request failed: {}", e);
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

async fn pincode_handler(
    State(state): State<AppState>,
    Path(pin): Path<String>,
    Query(query): Query<PinCodeQuery>
) -> Response {
    let pin = normalize_digits(pin.trim());
    if !is_valid_pin_code(&pin) {
        return error_response(StatusCode::BAD_REQUEST, format!("'{}' is not a six-digit pin code", pin));
    }
    let knowledge = state.agent.knowledge();
    Json(PinCodeResponse {
        serviceable: knowledge.is_serviceable(&pin),
        message: knowledge.serviceability_message(&pin, query.language),
        pin_code: pin,
    }).into_response()
}

async fn reload_prompts_handler(State(state): State<AppState>) -> Response {
    match state.agent.reload_prompts_if_changed() {
        Ok(true) => Json(ReloadResponse { success: true, message: "Prompts reloaded".into() }).into_response(),
        Ok(false) => Json(ReloadResponse { success: true, message: "Prompts unchanged".into() }).into_response(),
        Err(e) =>
            (
                StatusCode::BAD_REQUEST,
                Json(ReloadResponse { success: false, message: format!("Reload error: {}", e) }),
            ).into_response(),
    }
}
