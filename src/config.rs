use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use schemadex_core::graph::{DEFAULT_CONFIDENCE_BASE, DEFAULT_MAX_HOPS};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexerConfig {
    /// Persist the run checkpoint after this many document writes.
    #[serde(default = "default_checkpoint_every")]
    pub checkpoint_every: usize,
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
    #[serde(default = "default_confidence_base")]
    pub confidence_base: f64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            checkpoint_every: default_checkpoint_every(),
            max_hops: default_max_hops(),
            confidence_base: default_confidence_base(),
        }
    }
}

fn default_checkpoint_every() -> usize {
    25
}
fn default_max_hops() -> usize {
    DEFAULT_MAX_HOPS
}
fn default_confidence_base() -> f64 {
    DEFAULT_CONFIDENCE_BASE
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Base URL override (OpenAI-compatible gateways, remote Ollama).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retry_base_ms: default_retry_base_ms(),
            timeout_secs: default_timeout_secs(),
            url: None,
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    32
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_base_ms() -> u64 {
    500
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate indexer
    if config.indexer.checkpoint_every == 0 {
        anyhow::bail!("indexer.checkpoint_every must be > 0");
    }
    if !(1..=8).contains(&config.indexer.max_hops) {
        anyhow::bail!("indexer.max_hops must be in [1, 8]");
    }
    let base = config.indexer.confidence_base;
    if !(base > 0.0 && base < 1.0) {
        anyhow::bail!("indexer.confidence_base must be in (0.0, 1.0)");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let config = parse_config("[db]\npath = \"./data/schemadex.sqlite\"\n").unwrap();
        assert_eq!(config.indexer.checkpoint_every, 25);
        assert_eq!(config.indexer.max_hops, 3);
        assert_eq!(config.indexer.confidence_base, 0.9);
        assert!(!config.embedding.is_enabled());
        assert_eq!(config.embedding.batch_size, 32);
        assert_eq!(config.embedding.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn rejects_out_of_range_indexer_settings() {
        for bad in [
            "[indexer]\nmax_hops = 0",
            "[indexer]\nmax_hops = 9",
            "[indexer]\nconfidence_base = 1.0",
            "[indexer]\nconfidence_base = 0.0",
            "[indexer]\ncheckpoint_every = 0",
        ] {
            let text = format!("[db]\npath = \"x.sqlite\"\n{}\n", bad);
            assert!(parse_config(&text).is_err(), "accepted: {}", bad);
        }
    }

    #[test]
    fn enabled_provider_needs_model_and_dims() {
        let base = "[db]\npath = \"x.sqlite\"\n[embedding]\n";
        assert!(parse_config(&format!("{}provider = \"openai\"\ndims = 8\n", base)).is_err());
        assert!(parse_config(&format!("{}provider = \"ollama\"\nmodel = \"m\"\n", base)).is_err());
        assert!(parse_config(&format!("{}provider = \"local\"\n", base)).is_err());
        let ok = parse_config(&format!(
            "{}provider = \"ollama\"\nmodel = \"nomic-embed-text\"\ndims = 768\n",
            base
        ))
        .unwrap();
        assert!(ok.embedding.is_enabled());
    }
}
