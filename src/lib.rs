pub mod agent;
pub mod cli;
pub mod config;
pub mod conversation;
pub mod knowledge;
pub mod language;
pub mod llm;
pub mod models;
pub mod server;
pub mod speech;
pub mod terminal;

use agent::SupportAgent;
use cli::Args;
use log::info;
use server::Server;
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!("--- Core Configuration ---");
    info!("Mode: {}", if args.interactive { "interactive terminal" } else { "server" });
    info!("Chat LLM Type: {}", args.chat_llm_type);
    info!("Transcriber Type: {}", args.transcriber_type);
    info!("Synthesizer Type: {}", args.synthesizer_type);
    info!("Prompts Path: {}", args.prompts_path);
    info!("Knowledge Path: {}", args.knowledge_path.as_deref().unwrap_or("built-in"));
    info!("Default Language: {}", args.default_language);
    if args.interactive {
        info!("Recorder: {}", args.recorder_cmd);
        info!("Player: {}", args.player_cmd);
        info!("Narrator: {}", args.narrator_cmd);
        info!("Autoplay: {}", args.autoplay);
    } else {
        info!("Server Address: {}", args.server_addr);
        info!("HTTP Address: {}", args.http_addr.as_deref().unwrap_or("disabled"));
        info!("TLS Enabled: {}", args.tls_enabled());
    }
    info!("-------------------------");

    let agent = Arc::new(SupportAgent::new(&args)?);
    info!("Support agent ready: {}", agent.describe());

    if args.interactive {
        return terminal::run_terminal(agent, &args).await;
    }

    let addr = args.server_addr.clone();
    info!("Starting server on: {}", addr);
    let server = Server::new(addr, agent, args.server_api_key.clone(), args.clone());
    server.run().await
}
