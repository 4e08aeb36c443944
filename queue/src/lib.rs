//! Deferred-work messaging for the TokenGrid mirror.
//!
//! Delivery is at-least-once: a leased message that is not acknowledged
//! before its visibility timeout becomes visible again. There is no ordering
//! guarantee. Every handler must therefore be idempotent.

pub mod config;
pub mod error;
pub mod lmdb;
pub mod message;

use async_trait::async_trait;
use serde::Serialize;

pub use config::QueueConfig;
pub use error::QueueError;
pub use lmdb::LmdbQueue;
pub use message::{LeasedMessage, Message};

/// Approximate queue depth, for status pages and the CLI.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueCounts {
    pub visible: u64,
    pub in_flight: u64,
    pub dead_lettered: u64,
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Enqueue a raw body. Returns the message id.
    async fn send_body(&self, body: String, delay_secs: u64) -> Result<String, QueueError>;

    /// Lease up to `max_messages`, waiting up to `long_poll_secs` for at least
    /// one to become visible.
    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout_secs: u64,
        long_poll_secs: u64,
    ) -> Result<Vec<LeasedMessage>, QueueError>;

    /// Delete a leased message. Returns `false` when the lease is stale
    /// (the message was re-leased or is already gone).
    async fn ack(&self, leased: &LeasedMessage) -> Result<bool, QueueError>;

    /// Move every dead-lettered message back onto the main queue.
    async fn redrive(&self) -> Result<u64, QueueError>;

    async fn approximate_counts(&self) -> Result<QueueCounts, QueueError>;

    async fn send(&self, message: &Message, delay_secs: u64) -> Result<String, QueueError> {
        let body = message.to_body()?;
        tracing::debug!(command = message.command(), network = %message.network(), delay_secs, "enqueue");
        self.send_body(body, delay_secs).await
    }
}
