use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use contrapart_sync::EngineConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default)]
    pub token: String,
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("suppliers.json")
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_page_size() -> usize {
    120
}

fn default_page_delay_ms() -> u64 {
    500
}

impl Config {
    /// Load from a toml file. `CONTRAPART_API_TOKEN` overrides the file's
    /// token so credentials can stay out of the config.
    pub fn load(path: &Path) -> anyhow::Result<Config> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: Config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        if let Ok(token) = std::env::var("CONTRAPART_API_TOKEN") {
            config.api.token = token;
        }
        Ok(config)
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            page_size: self.page_size,
            page_delay: Duration::from_millis(self.page_delay_ms),
            cache_ttl: Duration::from_secs(self.cache_ttl_secs),
        }
    }
}
