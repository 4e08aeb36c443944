//! Daemon configuration with TOML file support.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokengrid_chain::EndpointConfig;
use tokengrid_queue::QueueConfig;
use tokengrid_sync::{ImagesConfig, OffchainConfig, SyncConfig};
use tokengrid_types::Network;
use tokengrid_utils::LogFormat;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for the TokenGrid daemon.
///
/// Loaded from a TOML file via [`DaemonConfig::from_toml_file`]; every field
/// has a default so an empty file is valid. CLI flags override file values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Root directory for the mirror database and the work queue.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Contract registry file (`[[contracts]]` entries).
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,

    /// Node endpoint per network.
    #[serde(default)]
    pub networks: BTreeMap<Network, EndpointConfig>,

    #[serde(default = "QueueConfig::default")]
    pub queue: QueueConfig,

    #[serde(default = "SyncConfig::default")]
    pub sync: SyncConfig,

    #[serde(default = "OffchainConfig::default")]
    pub offchain: OffchainConfig,

    #[serde(default = "ImagesConfig::default")]
    pub images: ImagesConfig,

    /// Operator alerts are POSTed here; logged only when unset.
    #[serde(default)]
    pub alert_webhook_url: Option<String>,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    PathBuf::from("./tokengrid_data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("contracts.toml")
}

// ── Impl ───────────────────────────────────────────────────────────────

impl DaemonConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config
            .queue
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    pub fn store_dir(&self) -> PathBuf {
        self.data_dir.join("store")
    }

    pub fn queue_dir(&self) -> PathBuf {
        self.data_dir.join("queue")
    }

    pub fn endpoints(&self) -> HashMap<Network, EndpointConfig> {
        self.networks
            .iter()
            .map(|(network, endpoint)| (network.clone(), endpoint.clone()))
            .collect()
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            api_port: default_api_port(),
            registry_path: default_registry_path(),
            networks: BTreeMap::new(),
            queue: QueueConfig::default(),
            sync: SyncConfig::default(),
            offchain: OffchainConfig::default(),
            images: ImagesConfig::default(),
            alert_webhook_url: None,
        }
    }
}
