//! Image ingestion collaborator.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokengrid_store::{Image, ImageVariant};
use tokengrid_types::{GridError, GridResult, Timestamp};

/// What the resizing service reports for one source image.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestedImage {
    pub image_id: String,
    pub original_url: String,
    #[serde(default)]
    pub variants: Vec<ImageVariant>,
}

impl IngestedImage {
    pub fn into_image(self, created_date: Timestamp) -> Image {
        Image {
            image_id: self.image_id,
            original_url: self.original_url,
            variants: self.variants,
            created_date,
        }
    }
}

#[async_trait]
pub trait ImageIngestor: Send + Sync {
    async fn ingest(&self, source_url: &str) -> GridResult<IngestedImage>;
}

/// POSTs `{"url": source}` to `{service_url}/images`.
pub struct HttpImageIngestor {
    http_client: reqwest::Client,
    service_url: Option<String>,
}

impl HttpImageIngestor {
    pub fn new(service_url: Option<String>) -> GridResult<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| GridError::Internal(format!("failed to build image HTTP client: {e}")))?;
        Ok(Self {
            http_client,
            service_url,
        })
    }
}

#[async_trait]
impl ImageIngestor for HttpImageIngestor {
    async fn ingest(&self, source_url: &str) -> GridResult<IngestedImage> {
        let service = self
            .service_url
            .as_deref()
            .ok_or_else(|| GridError::Internal("image service is not configured".into()))?;
        let endpoint = format!("{}/images", service.trim_end_matches('/'));

        let response = self
            .http_client
            .post(&endpoint)
            .json(&json!({ "url": source_url }))
            .send()
            .await
            .map_err(|e| GridError::Internal(format!("image service unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GridError::Internal(format!(
                "image service returned HTTP {status}: {body}"
            )));
        }
        response
            .json::<IngestedImage>()
            .await
            .map_err(|e| GridError::Internal(format!("invalid image service response: {e}")))
    }
}
