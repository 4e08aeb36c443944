use serde::{Deserialize, Serialize};

/// `[sync]` section of the daemon config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// HTTP gateway `ipfs://` URIs are rewritten onto.
    #[serde(default = "default_ipfs_gateway")]
    pub ipfs_gateway: String,

    #[serde(default = "default_metadata_timeout_secs")]
    pub metadata_timeout_secs: u64,

    /// Widest block range one `PROCESS_BLOCKS` run scans.
    #[serde(default = "default_max_block_range")]
    pub max_block_range: u64,
}

/// `[offchain]` section of the daemon config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffchainConfig {
    /// Block `b` is confirmed once `b + confirmations <= head`.
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,

    /// Expected block interval, used to delay the confirmation step.
    #[serde(default = "default_block_time_secs")]
    pub block_time_secs: u64,
}

/// `[images]` section of the daemon config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Image-resizing service; ingestion is disabled when unset.
    #[serde(default)]
    pub service_url: Option<String>,

    /// Public origin of the HTTP surface, used to build resizable URLs.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl ImagesConfig {
    pub fn resizable_url(&self, image_id: &str) -> String {
        format!(
            "{}/images/{}/go",
            self.public_base_url.trim_end_matches('/'),
            image_id
        )
    }
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_ipfs_gateway() -> String {
    "https://ipfs.io/ipfs/".to_string()
}

fn default_metadata_timeout_secs() -> u64 {
    10
}

fn default_max_block_range() -> u64 {
    2_000
}

fn default_confirmations() -> u64 {
    12
}

fn default_block_time_secs() -> u64 {
    12
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ipfs_gateway: default_ipfs_gateway(),
            metadata_timeout_secs: default_metadata_timeout_secs(),
            max_block_range: default_max_block_range(),
        }
    }
}

impl Default for OffchainConfig {
    fn default() -> Self {
        Self {
            confirmations: default_confirmations(),
            block_time_secs: default_block_time_secs(),
        }
    }
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            service_url: None,
            public_base_url: default_public_base_url(),
        }
    }
}
