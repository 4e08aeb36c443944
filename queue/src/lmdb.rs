//! Durable work queue on LMDB.
//!
//! One environment holds two databases keyed by message id:
//! `main` (visible and leased messages) and `dead_letter`. A lease is a
//! fresh receipt handle plus a visibility deadline written back into the
//! record, so an unacknowledged message simply becomes due again.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use heed::types::Bytes;
use heed::{Database, Env};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tokengrid_store_lmdb::{create_bytes_db, open_env};
use tokengrid_types::{Clock, Timestamp};
use uuid::Uuid;

use crate::{LeasedMessage, QueueConfig, QueueCounts, QueueError, WorkQueue};

const MAIN_DB: &str = "main";
const DEAD_LETTER_DB: &str = "dead_letter";

/// Upper bound between visibility checks while long-polling.
const POLL_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Clone, Debug, Serialize, Deserialize)]
struct QueuedRecord {
    body: String,
    sent_at: Timestamp,
    visible_at: Timestamp,
    receive_count: u32,
    receipt: Option<String>,
}

pub struct LmdbQueue {
    env: Arc<Env>,
    main_db: Database<Bytes, Bytes>,
    dead_letter_db: Database<Bytes, Bytes>,
    config: QueueConfig,
    clock: Arc<dyn Clock>,
    arrivals: Notify,
}

impl LmdbQueue {
    pub fn open(
        path: &Path,
        config: QueueConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, QueueError> {
        config.validate()?;
        let env = open_env(path, 4, config.map_size)?;
        let mut wtxn = env.write_txn()?;
        let main_db = create_bytes_db(&env, &mut wtxn, MAIN_DB)?;
        let dead_letter_db = create_bytes_db(&env, &mut wtxn, DEAD_LETTER_DB)?;
        wtxn.commit()?;
        tracing::info!(path = %path.display(), "opened work queue");
        Ok(Self {
            env,
            main_db,
            dead_letter_db,
            config,
            clock,
            arrivals: Notify::new(),
        })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Deterministic per-delivery jitter in `0..=redelivery_jitter_secs`.
    fn jitter_secs(&self, message_id: &str, receive_count: u32) -> u64 {
        let span = self.config.redelivery_jitter_secs;
        if span == 0 {
            return 0;
        }
        let seed = Uuid::parse_str(message_id)
            .map(|u| u.as_u128())
            .unwrap_or_default();
        (seed.wrapping_add(u128::from(receive_count)) % u128::from(span + 1)) as u64
    }

    /// Lease due messages in one write transaction, dead-lettering any that
    /// already reached `max_receive_count`.
    fn lease_due(
        &self,
        max_messages: usize,
        visibility_timeout_secs: u64,
    ) -> Result<Vec<LeasedMessage>, QueueError> {
        let now = self.clock.now();
        let mut wtxn = self.env.write_txn()?;

        let mut due = Vec::new();
        for entry in self.main_db.iter(&wtxn)? {
            let (key, bytes) = entry?;
            let record: QueuedRecord = bincode::deserialize(bytes)?;
            if record.visible_at <= now {
                due.push((key.to_vec(), record));
            }
        }
        due.sort_by_key(|(_, r)| (r.sent_at, r.visible_at));

        let mut leased = Vec::new();
        for (key, mut record) in due {
            if leased.len() >= max_messages {
                break;
            }
            let message_id = String::from_utf8_lossy(&key).into_owned();

            if record.receive_count >= self.config.max_receive_count {
                record.receipt = None;
                self.main_db.delete(&mut wtxn, &key)?;
                self.dead_letter_db
                    .put(&mut wtxn, &key, &bincode::serialize(&record)?)?;
                tracing::warn!(
                    %message_id,
                    receive_count = record.receive_count,
                    "message exceeded max receive count, dead-lettered"
                );
                continue;
            }

            record.receive_count += 1;
            let receipt = Uuid::new_v4().to_string();
            record.receipt = Some(receipt.clone());
            record.visible_at = now.plus_secs(
                visibility_timeout_secs + self.jitter_secs(&message_id, record.receive_count),
            );
            self.main_db
                .put(&mut wtxn, &key, &bincode::serialize(&record)?)?;

            leased.push(LeasedMessage {
                message_id,
                receipt_handle: receipt,
                body: record.body,
                receive_count: record.receive_count,
            });
        }

        wtxn.commit()?;
        Ok(leased)
    }
}

#[async_trait]
impl WorkQueue for LmdbQueue {
    async fn send_body(&self, body: String, delay_secs: u64) -> Result<String, QueueError> {
        let now = self.clock.now();
        let message_id = Uuid::new_v4().to_string();
        let record = QueuedRecord {
            body,
            sent_at: now,
            visible_at: now.plus_secs(delay_secs),
            receive_count: 0,
            receipt: None,
        };
        let mut wtxn = self.env.write_txn()?;
        self.main_db
            .put(&mut wtxn, message_id.as_bytes(), &bincode::serialize(&record)?)?;
        wtxn.commit()?;
        self.arrivals.notify_waiters();
        Ok(message_id)
    }

    async fn receive(
        &self,
        max_messages: usize,
        visibility_timeout_secs: u64,
        long_poll_secs: u64,
    ) -> Result<Vec<LeasedMessage>, QueueError> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(long_poll_secs);
        loop {
            let leased = self.lease_due(max_messages.max(1), visibility_timeout_secs)?;
            if !leased.is_empty() {
                return Ok(leased);
            }
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            let wait = (deadline - now).min(POLL_INTERVAL);
            // Either a send wakes us or we re-check after `wait`.
            let _ = tokio::time::timeout(wait, self.arrivals.notified()).await;
        }
    }

    async fn ack(&self, leased: &LeasedMessage) -> Result<bool, QueueError> {
        let key = leased.message_id.as_bytes();
        let mut wtxn = self.env.write_txn()?;
        let current: Option<QueuedRecord> = match self.main_db.get(&wtxn, key)? {
            Some(bytes) => Some(bincode::deserialize(bytes)?),
            None => None,
        };
        match current {
            Some(record) if record.receipt.as_deref() == Some(leased.receipt_handle.as_str()) => {
                self.main_db.delete(&mut wtxn, key)?;
                wtxn.commit()?;
                Ok(true)
            }
            _ => {
                tracing::debug!(message_id = %leased.message_id, "ack with stale receipt ignored");
                Ok(false)
            }
        }
    }

    async fn redrive(&self) -> Result<u64, QueueError> {
        let now = self.clock.now();
        let mut wtxn = self.env.write_txn()?;
        let mut dead = Vec::new();
        for entry in self.dead_letter_db.iter(&wtxn)? {
            let (key, bytes) = entry?;
            dead.push((key.to_vec(), bincode::deserialize::<QueuedRecord>(bytes)?));
        }
        for (key, mut record) in dead.iter().cloned() {
            record.receive_count = 0;
            record.receipt = None;
            record.visible_at = now;
            self.main_db
                .put(&mut wtxn, &key, &bincode::serialize(&record)?)?;
            self.dead_letter_db.delete(&mut wtxn, &key)?;
        }
        wtxn.commit()?;
        if !dead.is_empty() {
            self.arrivals.notify_waiters();
        }
        tracing::info!(count = dead.len(), "redrove dead-lettered messages");
        Ok(dead.len() as u64)
    }

    async fn approximate_counts(&self) -> Result<QueueCounts, QueueError> {
        let now = self.clock.now();
        let rtxn = self.env.read_txn()?;
        let mut counts = QueueCounts::default();
        for entry in self.main_db.iter(&rtxn)? {
            let (_, bytes) = entry?;
            let record: QueuedRecord = bincode::deserialize(bytes)?;
            if record.visible_at <= now {
                counts.visible += 1;
            } else {
                counts.in_flight += 1;
            }
        }
        counts.dead_lettered = self.dead_letter_db.len(&rtxn)?;
        Ok(counts)
    }
}
