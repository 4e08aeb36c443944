//! Local secp256k1 signer.

use k256::ecdsa::{SigningKey, VerifyingKey};
use tokengrid_types::{Address, PrivateKey};

use crate::hash::{keccak256, personal_message_hash};
use crate::sign::RecoverableSignature;
use crate::CryptoError;

/// Derive the account address for a public key:
/// the last 20 bytes of `keccak256(uncompressed_point[1..])`.
pub fn address_from_verifying_key(key: &VerifyingKey) -> Address {
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_word(&hash)
}

/// Holds a secret key in memory and signs 32-byte digests with it.
pub struct LocalSigner {
    key: SigningKey,
    address: Address,
}

impl LocalSigner {
    pub fn from_private_key(private: &PrivateKey) -> Result<Self, CryptoError> {
        let key = SigningKey::from_slice(&private.0).map_err(|_| CryptoError::InvalidPrivateKey)?;
        let address = address_from_verifying_key(key.verifying_key());
        Ok(Self { key, address })
    }

    /// The account address controlled by this key.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sign a 32-byte digest, returning `r‖s` plus the y-parity bit.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<RecoverableSignature, CryptoError> {
        let (sig, recid) = self
            .key
            .sign_prehash_recoverable(digest)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;
        let bytes = sig.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Ok(RecoverableSignature {
            r,
            s,
            y_parity: recid.to_byte() & 1,
        })
    }

    /// `personal_sign` over a UTF-8 or binary message.
    pub fn sign_personal_message(&self, message: &[u8]) -> Result<RecoverableSignature, CryptoError> {
        self.sign_digest(&personal_message_hash(message))
    }
}
