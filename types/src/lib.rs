//! Fundamental types for the TokenGrid mirror.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! checksum addresses, network names, token ids, timestamps and the closed error
//! taxonomy every component boundary maps into.

pub mod address;
pub mod error;
pub mod hash;
pub mod keys;
pub mod network;
pub mod time;

pub use address::Address;
pub use error::{ErrorKind, GridError, GridResult};
pub use hash::TxHash;
pub use keys::PrivateKey;
pub use network::Network;
pub use time::{Clock, SystemClock, Timestamp};

/// Token identifier inside one contract. Token ids start at 1.
pub type TokenId = u64;

/// Block height on a chain.
pub type BlockNumber = u64;
