//! Contract abstraction for the TokenGrid mirror.
//!
//! - [`abi`]: JSON ABI loading, call encoding and log decoding over `ethers::abi`
//! - [`registry`]: network → contract descriptor with canonical operation bindings
//! - [`transaction`]: legacy EIP-155 transaction signing with a local wallet
//! - [`client`]: the [`ChainClient`] seam and its JSON-RPC implementation

pub mod abi;
pub mod client;
pub mod error;
pub mod registry;
pub mod transaction;

pub use abi::{
    decode_log, encode_call, input_kinds, parse_abi, parse_token, token_id_from_fields, Abi,
    AbiError, Event, Token,
};
pub use client::{ChainClient, EndpointConfig, JsonRpcChainClient};
pub use error::ChainError;
pub use registry::{
    CanonicalEvent, CanonicalOperation, ContractDescriptor, ContractRegistry, OperationBindings,
};
pub use transaction::{sign_legacy, wallet_from_key, TxParams};
