use anyhow::Context;
use anyhow::Result;
use musiconn_api_client::ClientConfig;
use musiconn_events::AggregatorConfig;
use musiconn_suggest::SuggestConfig;
use musiconn_titles::FileSnapshotStore;
use musiconn_titles::TitleCacheConfig;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::path::PathBuf;

pub const CONFIG_FILENAME: &str = "config.toml";

/// Contents of `config.toml`. Every table is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MusiconnConfig {
    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub events: AggregatorConfig,

    #[serde(default)]
    pub titles: TitleCacheConfig,

    #[serde(default)]
    pub suggest: SuggestConfig,

    /// Where the title snapshot is kept (defaults to the musiconn home)
    #[serde(default)]
    pub cache_path: Option<PathBuf>,
}

impl MusiconnConfig {
    /// Reads `path`, or `config.toml` in the musiconn home when no path is
    /// given. A missing default file yields the defaults; a missing explicit
    /// file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (musiconn_home()?.join(CONFIG_FILENAME), false),
        };
        if !path.exists() {
            if required {
                anyhow::bail!("Config file not found at {}", path.display());
            }
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: MusiconnConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.client.validate().map_err(anyhow::Error::msg)?;
        self.events.validate().map_err(anyhow::Error::msg)?;
        self.titles.validate().map_err(anyhow::Error::msg)?;
        self.suggest.validate().map_err(anyhow::Error::msg)?;
        Ok(())
    }

    pub fn cache_path(&self) -> Result<PathBuf> {
        match &self.cache_path {
            Some(path) => Ok(path.clone()),
            None => Ok(musiconn_home()?.join(FileSnapshotStore::DEFAULT_FILENAME)),
        }
    }
}

/// `$MUSICONN_HOME`, or `~/.musiconn`.
pub fn musiconn_home() -> Result<PathBuf> {
    if let Some(home) = std::env::var_os("MUSICONN_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(home));
    }
    let home = dirs::home_dir().context("Could not determine the home directory")?;
    Ok(home.join(".musiconn"))
}
