pub mod config;
mod events_cmd;
mod suggest_cmd;
mod titles_cmd;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use config::MusiconnConfig;
use musiconn_api_client::FetchJson;
use musiconn_api_client::ResilientClient;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub use events_cmd::EventsArgs;
pub use events_cmd::LocationArgs;
pub use suggest_cmd::SuggestArgs;
pub use titles_cmd::CacheStatsArgs;
pub use titles_cmd::TitlesArgs;

const DEFAULT_LOG_FILTER: &str = "warn,musiconn_api_client=info,musiconn_events=info,\
musiconn_titles=info,musiconn_suggest=info,musiconn_cli=info";

/// Explore the musiconn performance database from the command line.
#[derive(Debug, Parser)]
#[command(name = "musiconn", version)]
pub struct Cli {
    /// Config file (defaults to ~/.musiconn/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Override the API endpoint
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Override where resolved titles are persisted
    #[arg(long, global = true, value_name = "PATH")]
    pub cache_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Events held by a location and its descendants, by year
    Events(EventsArgs),

    /// Describe a single location
    Location(LocationArgs),

    /// Resolve entity titles
    Titles(TitlesArgs),

    /// Show what the persisted title cache holds
    CacheStats(CacheStatsArgs),

    /// Autocomplete ranked by event count
    Suggest(SuggestArgs),
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut config = MusiconnConfig::load(self.config.as_deref())?;
        if let Some(base_url) = self.base_url {
            config.client.base_url = base_url;
        }
        if let Some(cache_path) = self.cache_path {
            config.cache_path = Some(cache_path);
        }
        config.validate()?;

        match self.command {
            Command::Events(args) => events_cmd::run_events(&config, args).await,
            Command::Location(args) => events_cmd::run_location(&config, args).await,
            Command::Titles(args) => titles_cmd::run_titles(&config, args).await,
            Command::CacheStats(args) => titles_cmd::run_cache_stats(&config, args),
            Command::Suggest(args) => suggest_cmd::run_suggest(&config, args).await,
        }
    }
}

/// Logs to stderr, filtered by `RUST_LOG` when set.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn api(config: &MusiconnConfig) -> Result<Arc<dyn FetchJson>> {
    let client =
        ResilientClient::new(&config.client).context("Failed to create API client")?;
    Ok(Arc::new(client))
}
