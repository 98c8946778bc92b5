//! TOML configuration.
//!
//! Every setting has a default, so the file is optional:
//!
//! ```toml
//! [cluster]
//! url = "http://localhost:8983/solr"
//! # timeout_secs = 60
//!
//! [collection]
//! name = "citation_graph"
//! num_shards = 2
//! replication_factor = 1
//! max_shards_per_node = 2
//! config_set = "_default"
//!
//! [ingest]
//! batch_size = 1000
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```
//!
//! `CITEGRAPH_SOLR_URL` and `CITEGRAPH_COLLECTION` override the file; CLI
//! flags override both.

use anyhow::{bail, Context, Result};
use citegraph_core::cluster::CollectionSpec;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Location checked when no `--config` is given.
pub const DEFAULT_CONFIG_PATH: &str = "./config/citegraph.toml";

pub const ENV_SOLR_URL: &str = "CITEGRAPH_SOLR_URL";
pub const ENV_COLLECTION: &str = "CITEGRAPH_COLLECTION";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClusterConfig {
    #[serde(default = "default_url")]
    pub url: String,
    /// Request timeout. Unset means the HTTP client's default (none).
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            timeout_secs: None,
        }
    }
}

fn default_url() -> String {
    "http://localhost:8983/solr".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    #[serde(default = "default_collection_name")]
    pub name: String,
    #[serde(default = "default_num_shards")]
    pub num_shards: u32,
    #[serde(default = "default_replication_factor")]
    pub replication_factor: u32,
    #[serde(default = "default_max_shards_per_node")]
    pub max_shards_per_node: u32,
    #[serde(default = "default_config_set")]
    pub config_set: String,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            name: default_collection_name(),
            num_shards: default_num_shards(),
            replication_factor: default_replication_factor(),
            max_shards_per_node: default_max_shards_per_node(),
            config_set: default_config_set(),
        }
    }
}

fn default_collection_name() -> String {
    "citation_graph".to_string()
}
fn default_num_shards() -> u32 {
    2
}
fn default_replication_factor() -> u32 {
    1
}
fn default_max_shards_per_node() -> u32 {
    2
}
fn default_config_set() -> String {
    "_default".to_string()
}

impl CollectionConfig {
    pub fn spec(&self) -> CollectionSpec {
        CollectionSpec {
            name: self.name.clone(),
            num_shards: self.num_shards,
            replication_factor: self.replication_factor,
            max_shards_per_node: self.max_shards_per_node,
            config_set: self.config_set.clone(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
        }
    }
}

fn default_batch_size() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Command-line overrides, applied after the file and the environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub solr_url: Option<String>,
    pub collection: Option<String>,
    pub log_level: Option<String>,
}

impl Config {
    pub fn with_overrides(mut self, overrides: Overrides) -> Result<Self> {
        if let Some(url) = overrides.solr_url {
            self.cluster.url = url;
        }
        if let Some(name) = overrides.collection {
            self.collection.name = name;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
        validate(&self)?;
        Ok(self)
    }
}

/// Load configuration from `path`, or from [`DEFAULT_CONFIG_PATH`] when it
/// exists, or fall back to defaults. Environment overrides are applied and
/// the result is validated.
pub fn resolve_config(path: Option<&Path>) -> Result<Config> {
    let mut config = match path {
        Some(p) => load_file(p)?,
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
            if default_path.exists() {
                load_file(&default_path)?
            } else {
                Config::default()
            }
        }
    };

    apply_env(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Apply `CITEGRAPH_*` overrides, reading variables through `lookup`.
pub fn apply_env(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup(ENV_SOLR_URL) {
        config.cluster.url = url;
    }
    if let Some(name) = lookup(ENV_COLLECTION) {
        config.collection.name = name;
    }
}

/// Parse and validate a configuration file without environment overrides.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = load_file(path)?;
    validate(&config)?;
    Ok(config)
}

fn load_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content).with_context(|| "Failed to parse config file")
}

pub fn validate(config: &Config) -> Result<()> {
    let url = config.cluster.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        bail!("cluster.url must be an http(s) URL, got '{}'", url);
    }
    if config.cluster.timeout_secs == Some(0) {
        bail!("cluster.timeout_secs must be > 0 when set");
    }

    if config.collection.name.trim().is_empty() {
        bail!("collection.name must not be empty");
    }
    if config.collection.num_shards == 0 {
        bail!("collection.num_shards must be > 0");
    }
    if config.collection.replication_factor == 0 {
        bail!("collection.replication_factor must be > 0");
    }
    if config.collection.max_shards_per_node == 0 {
        bail!("collection.max_shards_per_node must be > 0");
    }

    if config.ingest.batch_size == 0 {
        bail!("ingest.batch_size must be > 0");
    }

    Ok(())
}
