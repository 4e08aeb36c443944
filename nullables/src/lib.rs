//! Nullable infrastructure for deterministic testing.
//!
//! Every external collaborator (chain node, store, queue, metadata host,
//! image service, alert sink, clock) sits behind a trait. This crate
//! provides in-memory implementations that:
//! - Return scripted values
//! - Record what was asked of them
//! - Never touch the filesystem or network
//!
//! [`TestHarness`] wires one of each into a [`tokengrid_sync::SyncContext`].

pub mod chain;
pub mod clock;
pub mod collaborators;
pub mod harness;
pub mod queue;
pub mod store;

pub use chain::{transfer_log, NullChainClient, SubmittedTx};
pub use clock::NullClock;
pub use collaborators::{NullImageIngestor, NullMetadataFetcher, NullNotifier};
pub use harness::{test_descriptor, TestHarness, TEST_ABI, TEST_CONTRACT};
pub use queue::NullQueue;
pub use store::NullStore;
