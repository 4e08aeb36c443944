//! Nullable work queue: in-memory, no visibility timers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokengrid_queue::{LeasedMessage, Message, QueueCounts, QueueError, WorkQueue};

#[derive(Clone, Debug)]
struct Entry {
    message_id: String,
    body: String,
    delay_secs: u64,
    receipt: Option<String>,
    receive_count: u32,
}

/// Messages are delivered in send order regardless of delay. A leased
/// message stays leased until acked or [`NullQueue::expire_leases`].
#[derive(Default)]
pub struct NullQueue {
    entries: Mutex<Vec<Entry>>,
    next: AtomicU64,
}

impl NullQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message still on the queue, leased or not, with its send delay.
    pub fn pending(&self) -> Vec<(Message, u64)> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| Message::parse(&e.body).ok().map(|m| (m, e.delay_secs)))
            .collect()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.pending().into_iter().map(|(m, _)| m).collect()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// Make every leased message deliverable again, as if its visibility
    /// timeout had passed.
    pub fn expire_leases(&self) {
        for entry in self.entries.lock().unwrap().iter_mut() {
            entry.receipt = None;
        }
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{prefix}-{}", self.next.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl WorkQueue for NullQueue {
    async fn send_body(&self, body: String, delay_secs: u64) -> Result<String, QueueError> {
        let message_id = self.next_id("msg");
        self.entries.lock().unwrap().push(Entry {
            message_id: message_id.clone(),
            body,
            delay_secs,
            receipt: None,
            receive_count: 0,
        });
        Ok(message_id)
    }

    async fn receive(
        &self,
        max_messages: usize,
        _visibility_timeout_secs: u64,
        _long_poll_secs: u64,
    ) -> Result<Vec<LeasedMessage>, QueueError> {
        let mut entries = self.entries.lock().unwrap();
        let mut leased = Vec::new();
        for entry in entries.iter_mut().filter(|e| e.receipt.is_none()) {
            if leased.len() >= max_messages.max(1) {
                break;
            }
            let receipt = format!("receipt-{}", self.next.fetch_add(1, Ordering::SeqCst) + 1);
            entry.receipt = Some(receipt.clone());
            entry.receive_count += 1;
            leased.push(LeasedMessage {
                message_id: entry.message_id.clone(),
                receipt_handle: receipt,
                body: entry.body.clone(),
                receive_count: entry.receive_count,
            });
        }
        Ok(leased)
    }

    async fn ack(&self, leased: &LeasedMessage) -> Result<bool, QueueError> {
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|e| {
            !(e.message_id == leased.message_id
                && e.receipt.as_deref() == Some(leased.receipt_handle.as_str()))
        });
        Ok(entries.len() < before)
    }

    async fn redrive(&self) -> Result<u64, QueueError> {
        Ok(0)
    }

    async fn approximate_counts(&self) -> Result<QueueCounts, QueueError> {
        let entries = self.entries.lock().unwrap();
        let in_flight = entries.iter().filter(|e| e.receipt.is_some()).count() as u64;
        Ok(QueueCounts {
            visible: entries.len() as u64 - in_flight,
            in_flight,
            dead_lettered: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokengrid_types::Network;

    #[tokio::test]
    async fn lease_ack_and_expiry() {
        let queue = NullQueue::new();
        let network = Network::parse("testnet").unwrap();
        queue.send(&Message::update_token(&network, 1), 0).await.unwrap();

        let leased = queue.receive(1, 30, 0).await.unwrap().remove(0);
        assert!(queue.receive(1, 30, 0).await.unwrap().is_empty());

        queue.expire_leases();
        let again = queue.receive(1, 30, 0).await.unwrap().remove(0);
        assert_eq!(again.receive_count, 2);
        assert!(!queue.ack(&leased).await.unwrap());
        assert!(queue.ack(&again).await.unwrap());
        assert!(queue.messages().is_empty());
    }
}
