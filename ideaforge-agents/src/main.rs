//! ideaforge: turn a one-line product idea into a Web3 framework or repo.
//!
//!   ideaforge framework --idea "ticket resale marketplace" --industry events
//!   ideaforge repo --idea "ticket resale marketplace" --out repo.zip
//!
//! Requires OPENAI_API_KEY. Set RPC_URL and PRIVATE_KEY to deploy the
//! selected contract during `repo`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use ideaforge_chain::{ChainConfig, Deployer, SolcManager};

use ideaforge_agents::factory::{Factory, FactoryConfig, Framework, RepoRequest};
use ideaforge_agents::llm::{DEFAULT_BASE_URL, DEFAULT_MODEL, OpenAiClient};
use ideaforge_agents::{IdeaRequest, Stage};

#[derive(Parser)]
#[command(name = "ideaforge", about = "Multi-agent idea-to-repo generator")]
struct Args {
    /// OpenAI API key (or set OPENAI_API_KEY env var)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Chat model to use
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_MODEL)]
    model: String,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Per-agent completion timeout in seconds
    #[arg(long, env = "IDEAFORGE_AGENT_TIMEOUT_SECS", default_value_t = 120)]
    agent_timeout_secs: u64,

    /// Ceiling on a deployment, compile through receipt, in seconds
    #[arg(long, env = "IDEAFORGE_RECEIPT_TIMEOUT_SECS", default_value_t = 180)]
    receipt_timeout_secs: u64,

    /// Directory for downloaded solc builds
    #[arg(long, env = "IDEAFORGE_SOLC_CACHE")]
    solc_cache: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum StageArg {
    New,
    Existing,
}

impl From<StageArg> for Stage {
    fn from(s: StageArg) -> Self {
        match s {
            StageArg::New => Stage::New,
            StageArg::Existing => Stage::Existing,
        }
    }
}

#[derive(clap::Args)]
struct IdeaArgs {
    /// The product idea, in a sentence
    #[arg(long)]
    idea: String,

    #[arg(long, value_enum, default_value = "new")]
    stage: StageArg,

    #[arg(long)]
    industry: Option<String>,
}

impl IdeaArgs {
    fn into_request(self) -> Result<IdeaRequest> {
        if self.idea.trim().is_empty() {
            bail!("--idea must not be blank");
        }
        Ok(IdeaRequest {
            idea: self.idea,
            stage: self.stage.into(),
            industry: self.industry.filter(|s| !s.trim().is_empty()),
        })
    }
}

#[derive(Subcommand)]
enum Command {
    /// Run the design agents and print the framework JSON
    Framework {
        #[command(flatten)]
        idea: IdeaArgs,
    },
    /// Generate code, attempt deployment, and write the repo archive
    Repo {
        #[command(flatten)]
        idea: IdeaArgs,

        /// Framework JSON from an earlier `framework` run
        #[arg(long)]
        framework: Option<PathBuf>,

        /// Where to write the archive
        #[arg(long, default_value = "repo.zip")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ideaforge=info,ideaforge_agents=info,ideaforge_chain=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let llm = OpenAiClient::new(args.api_key.clone())
        .with_model(&args.model)
        .with_base_url(&args.base_url);
    tracing::info!(model = %llm.model(), "Using completion model");

    let mut chain = ChainConfig::from_env();
    chain.receipt.timeout = Duration::from_secs(args.receipt_timeout_secs);
    let solc = match &args.solc_cache {
        Some(dir) => SolcManager::new(dir),
        None => SolcManager::with_default_cache(),
    };
    let deployer = Deployer::new(chain, Arc::new(solc));

    let factory = Factory::new(
        Arc::new(llm),
        Arc::new(deployer),
        FactoryConfig {
            agent_timeout: Duration::from_secs(args.agent_timeout_secs),
            deploy_timeout: Duration::from_secs(args.receipt_timeout_secs),
        },
    );

    match args.command {
        Command::Framework { idea } => {
            let result = factory.generate_framework(&idea.into_request()?).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Repo { idea, framework, out } => {
            let idea = idea.into_request()?;
            let framework = match framework {
                Some(path) => Some(load_framework(&path).await?),
                None => None,
            };
            let request = RepoRequest {
                idea,
                framework,
            };
            let result = factory.generate_repo(&request).await?;
            tokio::fs::write(&out, &result.zip)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            let summary = serde_json::json!({
                "archive": out.display().to_string(),
                "bytes": result.zip.len(),
                "security_report": result.security_report,
                "deployment": result.deployment,
                "deployment_error": result.deployment_error,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}

/// Accepts either a bare framework or a full `framework` command output.
async fn load_framework(path: &PathBuf) -> Result<Framework> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text).context("Framework file is not JSON")?;
    let inner = value.get("framework").cloned().unwrap_or(value);
    serde_json::from_value(inner).context("Framework file does not match the framework shape")
}
