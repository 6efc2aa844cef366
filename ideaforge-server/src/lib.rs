//! ideaforge-server: HTTP front for the idea factory.

pub mod config;
pub mod web;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use ideaforge_agents::{Factory, OpenAiClient, ProjectStore};
use ideaforge_chain::{Deployer, SolcManager};

use crate::config::ServerConfig;
use crate::web::AppState;

/// Wire the real model client, deployer and project store from config.
pub fn build_state(config: &ServerConfig) -> Result<AppState> {
    let llm = OpenAiClient::new(config.openai_api_key.clone())
        .with_model(&config.openai_model)
        .with_base_url(&config.openai_base_url);

    let chain = config.chain_config();
    if chain.credentials().is_none() {
        tracing::warn!("RPC_URL or PRIVATE_KEY not set; generated contracts will not be deployed");
    }
    let solc = match &config.solc_cache {
        Some(dir) => SolcManager::new(dir),
        None => SolcManager::with_default_cache(),
    };
    let deployer = Deployer::new(chain, Arc::new(solc));

    if let Some(parent) = config.projects_db.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let projects = ProjectStore::open(&config.projects_db).context("Failed to open projects database")?;

    Ok(AppState {
        factory: Factory::new(Arc::new(llm), Arc::new(deployer), config.factory_config()),
        projects,
    })
}

/// Bind and serve in the background. Returns the bound address.
pub async fn start(
    state: AppState,
    listen_addr: &str,
) -> Result<(SocketAddr, tokio::task::JoinHandle<Result<()>>)> {
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("Failed to bind {listen_addr}"))?;
    let addr = listener.local_addr()?;
    let app = web::router(Arc::new(state));
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.context("HTTP server error")
    });
    Ok((addr, handle))
}
