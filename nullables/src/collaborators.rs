//! Nullable HTTP collaborators: metadata host, image service, alert sink.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokengrid_store::ImageVariant;
use tokengrid_sync::{Alert, ImageIngestor, IngestedImage, MetadataFetcher, Notifier};
use tokengrid_types::{GridError, GridResult};

/// Serves scripted documents by URI.
#[derive(Default)]
pub struct NullMetadataFetcher {
    documents: Mutex<HashMap<String, Value>>,
    fetched: Mutex<Vec<String>>,
}

impl NullMetadataFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_document(&self, uri: &str, document: Value) {
        self.documents
            .lock()
            .unwrap()
            .insert(uri.to_string(), document);
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl MetadataFetcher for NullMetadataFetcher {
    async fn fetch(&self, uri: &str) -> GridResult<Value> {
        self.fetched.lock().unwrap().push(uri.to_string());
        self.documents
            .lock()
            .unwrap()
            .get(uri)
            .cloned()
            .ok_or_else(|| GridError::BadRequest(format!("metadata at {uri} returned HTTP 404")))
    }
}

/// Produces `img-N` images with 100, 200 and 500 px square variants.
#[derive(Default)]
pub struct NullImageIngestor {
    next: AtomicU64,
    requests: Mutex<Vec<String>>,
    failure: Mutex<Option<String>>,
}

impl NullImageIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, message: Option<&str>) {
        *self.failure.lock().unwrap() = message.map(str::to_string);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageIngestor for NullImageIngestor {
    async fn ingest(&self, source_url: &str) -> GridResult<IngestedImage> {
        self.requests.lock().unwrap().push(source_url.to_string());
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(GridError::Internal(message));
        }
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(IngestedImage {
            image_id: format!("img-{n}"),
            original_url: source_url.to_string(),
            variants: [100, 200, 500]
                .into_iter()
                .map(|size| ImageVariant {
                    width: size,
                    height: size,
                    url: format!("https://cdn.test/img-{n}/{size}.png"),
                })
                .collect(),
        })
    }
}

/// Records alerts instead of delivering them.
#[derive(Default)]
pub struct NullNotifier {
    alerts: Mutex<Vec<Alert>>,
}

impl NullNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for NullNotifier {
    async fn notify(&self, alert: &Alert) {
        self.alerts.lock().unwrap().push(alert.clone());
    }
}
