pub mod api;
pub mod websocket;

use crate::agent::SupportAgent;
use crate::cli::Args;
use log::{ info, warn };
use std::error::Error;
use std::sync::Arc;

pub struct Server {
    addr: String,
    agent: Arc<SupportAgent>,
    api_key: Option<String>,
    args: Args,
}

impl Server {
    pub fn new(addr: String, agent: Arc<SupportAgent>, api_key: Option<String>, args: Args) -> Self {
        let api_key = api_key.filter(|k| !k.trim().is_empty());

        if api_key.is_some() {
            info!("Server configured with API Key authentication.");
        } else {
            warn!("Server configured WITHOUT API Key authentication. Connections are open.");
        }

        Self { addr, agent, api_key, args }
    }

    pub async fn run(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        if let Some(http_addr) = &self.args.http_addr {
            api::start_http_server(http_addr, self.agent.clone(), self.args.clone()).await?;
        }

        websocket::start_ws_server(
            &self.addr,
            self.agent.clone(),
            self.api_key.clone(),
            self.args.clone()
        ).await
    }
}
