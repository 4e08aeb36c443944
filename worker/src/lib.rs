//! The long-running consumer of the work queue.
//!
//! [`WorkerLoop`] leases one message at a time, dispatches it to the sync
//! engine or the off-chain content manager, and acknowledges it only on
//! success. Failed messages are left to reappear after their visibility
//! timeout until the queue dead-letters them.

pub mod metrics;
pub mod worker_loop;

pub use metrics::WorkerMetrics;
pub use worker_loop::{PollOutcome, WorkerLoop, WorkerState};
