//! Token metadata documents.
//!
//! A token's content URI points at a JSON document. Field names vary between
//! minting tools, so extraction falls back across the common spellings.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokengrid_types::{GridError, GridResult, TokenId};

use crate::SyncConfig;

/// Presentation fields extracted from a metadata document.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TokenMetadata {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub url: Option<String>,
    pub group_id: Option<TokenId>,
}

fn non_empty_str<'a>(doc: &'a Value, key: &str) -> Option<&'a str> {
    doc.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn token_id_field(doc: &Value, key: &str) -> Option<TokenId> {
    match doc.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl TokenMetadata {
    pub fn from_document(doc: &Value) -> GridResult<Self> {
        if !doc.is_object() {
            return Err(GridError::BadRequest(
                "metadata document is not a JSON object".into(),
            ));
        }
        Ok(Self {
            title: non_empty_str(doc, "title")
                .or_else(|| non_empty_str(doc, "name"))
                .unwrap_or_default()
                .to_string(),
            description: non_empty_str(doc, "description")
                .unwrap_or_default()
                .to_string(),
            image_url: non_empty_str(doc, "imageUrl")
                .or_else(|| non_empty_str(doc, "image"))
                .map(str::to_string),
            url: non_empty_str(doc, "url")
                .or_else(|| non_empty_str(doc, "external_url"))
                .map(str::to_string),
            group_id: token_id_field(doc, "groupId"),
        })
    }
}

/// Rewrite `ipfs://` URIs onto an HTTP gateway; other URIs pass through.
pub fn resolve_content_uri(uri: &str, gateway: &str) -> String {
    match uri.strip_prefix("ipfs://") {
        Some(path) => {
            let path = path.strip_prefix("ipfs/").unwrap_or(path);
            format!("{}/{}", gateway.trim_end_matches('/'), path)
        }
        None => uri.to_string(),
    }
}

#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// Fetch and parse the JSON document at `uri`.
    async fn fetch(&self, uri: &str) -> GridResult<Value>;
}

pub struct HttpMetadataFetcher {
    http_client: reqwest::Client,
    ipfs_gateway: String,
}

impl HttpMetadataFetcher {
    pub fn new(config: &SyncConfig) -> GridResult<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(config.metadata_timeout_secs))
            .build()
            .map_err(|e| GridError::Internal(format!("failed to build metadata HTTP client: {e}")))?;
        Ok(Self::with_client(http_client, config.ipfs_gateway.clone()))
    }

    pub fn with_client(http_client: reqwest::Client, ipfs_gateway: String) -> Self {
        Self {
            http_client,
            ipfs_gateway,
        }
    }
}

#[async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch(&self, uri: &str) -> GridResult<Value> {
        let url = resolve_content_uri(uri, &self.ipfs_gateway);
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(GridError::BadRequest(format!(
                "unsupported content URI scheme: {uri}"
            )));
        }

        let response = self.http_client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                GridError::Internal(format!("metadata fetch timed out: {url}"))
            } else {
                GridError::Internal(format!("metadata fetch failed: {e}"))
            }
        })?;

        let status = response.status();
        if status.is_client_error() {
            return Err(GridError::BadRequest(format!(
                "metadata at {url} returned HTTP {status}"
            )));
        }
        if !status.is_success() {
            return Err(GridError::Internal(format!(
                "metadata at {url} returned HTTP {status}"
            )));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| GridError::BadRequest(format!("metadata at {url} is not JSON: {e}")))
    }
}
