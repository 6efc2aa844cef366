//! Server configuration. Every flag can also come from the environment.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use ideaforge_agents::factory::FactoryConfig;
use ideaforge_agents::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use ideaforge_chain::config::{DEFAULT_EXPLORER_TEMPLATE, DEFAULT_NETWORK_NAME};
use ideaforge_chain::{ChainConfig, ReceiptPolicy};

#[derive(Parser, Debug, Clone)]
#[command(name = "ideaforge-server", about = "HTTP API for the ideaforge idea-to-repo pipeline")]
pub struct ServerConfig {
    /// Address to listen on
    #[arg(long, env = "IDEAFORGE_LISTEN", default_value = "0.0.0.0:8000")]
    pub listen_addr: String,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    pub openai_model: String,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub openai_base_url: String,

    /// JSON-RPC endpoint for deployments. Deployment is skipped when unset.
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: Option<String>,

    /// Deployer private key, hex. Deployment is skipped when unset.
    #[arg(long, env = "PRIVATE_KEY", hide = true, hide_env_values = true)]
    pub private_key: Option<String>,

    #[arg(long, env = "CONTRACT_NETWORK_NAME", default_value = DEFAULT_NETWORK_NAME)]
    pub network_name: String,

    /// Explorer URL with an `{address}` placeholder
    #[arg(long, env = "CONTRACT_EXPLORER_TEMPLATE", default_value = DEFAULT_EXPLORER_TEMPLATE)]
    pub explorer_template: String,

    /// SQLite file for saved projects
    #[arg(long, env = "IDEAFORGE_PROJECTS_DB", default_value = "data/projects.db")]
    pub projects_db: PathBuf,

    /// Per-agent completion timeout in seconds
    #[arg(long, env = "IDEAFORGE_AGENT_TIMEOUT_SECS", default_value_t = 120)]
    pub agent_timeout_secs: u64,

    /// Ceiling on one deployment, compile through receipt, in seconds
    #[arg(long, env = "IDEAFORGE_RECEIPT_TIMEOUT_SECS", default_value_t = 180)]
    pub receipt_timeout_secs: u64,

    /// Directory for downloaded solc builds
    #[arg(long, env = "IDEAFORGE_SOLC_CACHE")]
    pub solc_cache: Option<PathBuf>,
}

fn non_blank(v: &Option<String>) -> Option<String> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

impl ServerConfig {
    pub fn chain_config(&self) -> ChainConfig {
        ChainConfig {
            rpc_url: non_blank(&self.rpc_url),
            private_key: non_blank(&self.private_key),
            network_name: self.network_name.clone(),
            explorer_template: self.explorer_template.clone(),
            receipt: ReceiptPolicy {
                timeout: Duration::from_secs(self.receipt_timeout_secs),
                ..ReceiptPolicy::default()
            },
        }
    }

    pub fn factory_config(&self) -> FactoryConfig {
        FactoryConfig {
            agent_timeout: Duration::from_secs(self.agent_timeout_secs),
            deploy_timeout: Duration::from_secs(self.receipt_timeout_secs),
        }
    }
}
