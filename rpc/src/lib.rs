//! HTTP surface for the TokenGrid mirror.
//!
//! Provides endpoints for:
//! - Network status (last processed block, base image, token and queue counts)
//! - Grid item listing and lookup
//! - Enqueueing token updates and image uploads
//! - Off-chain group content submission
//! - Resizable image redirects
//! - Prometheus metrics

pub mod error;
pub mod handlers;
pub mod pagination;
pub mod server;

pub use error::{ErrorBody, RpcError};
pub use server::{AppState, RpcServer};
