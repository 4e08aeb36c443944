//! `Idle → Polling → Processing → (Idle | Polling)`.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokengrid_queue::{LeasedMessage, Message, QueueConfig, QueueError, WorkQueue};
use tokengrid_sync::{Alert, Notifier, OffchainContentManager, SyncEngine};
use tokengrid_types::{GridError, GridResult};
use tokio::sync::broadcast;

use crate::WorkerMetrics;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    Idle = 0,
    Polling = 1,
    Processing = 2,
}

impl WorkerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Polling,
            2 => Self::Processing,
            _ => Self::Idle,
        }
    }
}

/// What one poll did.
#[derive(Debug)]
pub enum PollOutcome {
    Empty,
    Succeeded { command: String },
    /// The handler failed; the message was not acknowledged.
    Failed { command: String, error: GridError },
}

pub struct WorkerLoop {
    queue: Arc<dyn WorkQueue>,
    engine: Arc<SyncEngine>,
    offchain: Arc<OffchainContentManager>,
    notifier: Arc<dyn Notifier>,
    metrics: Arc<WorkerMetrics>,
    config: QueueConfig,
    state: AtomicU8,
}

/// `(command, content)` of a raw body, for alerts about messages that may
/// not even parse.
fn describe_body(body: &str) -> (String, Value) {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => {
            let command = value
                .get("command")
                .and_then(Value::as_str)
                .unwrap_or("UNKNOWN")
                .to_string();
            let content = value.get("content").cloned().unwrap_or(Value::Null);
            (command, content)
        }
        Err(_) => ("UNKNOWN".to_string(), Value::String(body.to_string())),
    }
}

impl WorkerLoop {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        engine: Arc<SyncEngine>,
        offchain: Arc<OffchainContentManager>,
        notifier: Arc<dyn Notifier>,
        metrics: Arc<WorkerMetrics>,
        config: QueueConfig,
    ) -> Self {
        Self {
            queue,
            engine,
            offchain,
            notifier,
            metrics,
            config,
            state: AtomicU8::new(WorkerState::Idle as u8),
        }
    }

    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    /// Route a message to its handler.
    pub async fn dispatch(&self, message: &Message) -> GridResult<()> {
        match message {
            Message::UpdateTokens { network } => {
                self.engine.update_tokens(network).await?;
            }
            Message::UpdateToken { network, token_id } => {
                self.engine.update_token(network, *token_id).await?;
            }
            Message::UploadTokenImage { network, token_id } => {
                self.engine.upload_token_image(network, *token_id).await?;
            }
            Message::ProcessBlocks { network } => {
                self.engine.process_blocks(network).await?;
            }
            Message::ApplyOffchainContent { network } => {
                self.offchain.apply_confirmed(network).await?;
            }
        }
        Ok(())
    }

    /// Handle one leased message. Never fails: errors are logged, alerted
    /// and the message is left unacknowledged.
    pub async fn handle(&self, leased: &LeasedMessage) -> PollOutcome {
        self.set_state(WorkerState::Processing);
        self.metrics.messages_received.inc();
        let (command, content) = describe_body(&leased.body);
        tracing::debug!(
            message_id = %leased.message_id,
            %command,
            receive_count = leased.receive_count,
            "handling message"
        );

        let timer = self.metrics.handler_duration_seconds.start_timer();
        let result = match leased.message() {
            Ok(message) => self.dispatch(&message).await,
            Err(e) => Err(GridError::from(e)),
        };
        timer.observe_duration();

        let outcome = match result {
            Ok(()) => {
                self.metrics.messages_succeeded.inc();
                match self.queue.ack(leased).await {
                    Ok(true) => {}
                    Ok(false) => tracing::warn!(
                        message_id = %leased.message_id,
                        "lease expired before ack; message will be redelivered"
                    ),
                    Err(e) => tracing::warn!(message_id = %leased.message_id, error = %e, "ack failed"),
                }
                PollOutcome::Succeeded { command }
            }
            Err(error) => {
                self.metrics.messages_failed.inc();
                tracing::error!(
                    message_id = %leased.message_id,
                    %command,
                    receive_count = leased.receive_count,
                    error = %error,
                    "message handler failed"
                );
                self.notifier
                    .notify(&Alert::new(command.clone(), content, &error))
                    .await;
                PollOutcome::Failed { command, error }
            }
        };
        self.set_state(WorkerState::Idle);
        outcome
    }

    /// Long-poll for one message and handle it.
    pub async fn poll_once(&self) -> Result<PollOutcome, QueueError> {
        self.set_state(WorkerState::Polling);
        let leased = self
            .queue
            .receive(1, self.config.visibility_timeout_secs, self.config.long_poll_secs)
            .await;
        let leased = match leased {
            Ok(leased) => leased,
            Err(e) => {
                self.set_state(WorkerState::Idle);
                return Err(e);
            }
        };
        let Some(message) = leased.into_iter().next() else {
            self.metrics.empty_polls.inc();
            self.set_state(WorkerState::Idle);
            return Ok(PollOutcome::Empty);
        };
        Ok(self.handle(&message).await)
    }

    /// Poll until shutdown. An in-flight handler is abandoned on shutdown
    /// and its message redelivered after the visibility timeout.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            visibility_timeout_secs = self.config.visibility_timeout_secs,
            long_poll_secs = self.config.long_poll_secs,
            "worker started"
        );
        let idle = Duration::from_secs(self.config.idle_sleep_secs);
        loop {
            let rest = tokio::select! {
                _ = shutdown.recv() => break,
                polled = self.poll_once() => match polled {
                    Ok(PollOutcome::Empty) => true,
                    Ok(_) => false,
                    Err(e) => {
                        tracing::error!(error = %e, "queue receive failed");
                        true
                    }
                },
            };
            if rest {
                tokio::select! {
                    _ = shutdown.recv() => break,
                    _ = tokio::time::sleep(idle) => {}
                }
            }
        }
        self.set_state(WorkerState::Idle);
        tracing::info!("worker stopped");
    }
}
