use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    // JSON logs in production (IDEAFORGE_LOG_JSON=1), human-readable otherwise
    let json_logs = std::env::var("IDEAFORGE_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::from_default_env()
        .add_directive("ideaforge_server=info".parse()?)
        .add_directive("ideaforge_agents=info".parse()?)
        .add_directive("ideaforge_chain=info".parse()?);
    if json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = ideaforge_server::config::ServerConfig::parse();
    tracing::info!(
        model = %config.openai_model,
        network = %config.network_name,
        projects_db = %config.projects_db.display(),
        "Starting ideaforge server"
    );

    let state = ideaforge_server::build_state(&config)?;
    let (addr, handle) = ideaforge_server::start(state, &config.listen_addr).await?;
    tracing::info!(%addr, "HTTP API listening");
    handle.await?
}
