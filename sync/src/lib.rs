//! Reconciliation of on-chain token state into the grid store.
//!
//! - [`engine`]: [`SyncEngine`], the `UPDATE_TOKEN(S)`, `PROCESS_BLOCKS` and
//!   `UPLOAD_TOKEN_IMAGE` handlers
//! - [`offchain`]: signed off-chain content requests and their confirmation
//! - [`metadata`], [`images`], [`alert`]: the HTTP collaborators behind traits

pub mod alert;
pub mod config;
pub mod context;
pub mod engine;
pub mod images;
pub mod metadata;
pub mod offchain;

pub use alert::{Alert, LogNotifier, Notifier, WebhookNotifier};
pub use config::{ImagesConfig, OffchainConfig, SyncConfig};
pub use context::SyncContext;
pub use engine::{BatchReport, BlockScan, ImageOutcome, SyncEngine, UpdateOutcome};
pub use images::{HttpImageIngestor, ImageIngestor, IngestedImage};
pub use metadata::{resolve_content_uri, HttpMetadataFetcher, MetadataFetcher, TokenMetadata};
pub use offchain::{canonical_message, ContentRequest, OffchainContentManager};
