//! Cryptographic primitives for TokenGrid.
//!
//! - **Keccak-256** hashing
//! - **secp256k1** (via `k256`) for message signing and signer recovery
//! - **EIP-191** personal messages for off-chain content authorisation

pub mod error;
pub mod hash;
pub mod keys;
pub mod sign;

pub use error::CryptoError;
pub use hash::{keccak256, keccak256_multi, personal_message_hash};
pub use keys::LocalSigner;
pub use sign::{recover_personal_signer, recover_signer, RecoverableSignature};
