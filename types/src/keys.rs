//! Signing key material.

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::GridError;

/// A 32-byte secp256k1 secret scalar.
///
/// This type intentionally does not implement `Debug`, `Serialize`, or `Clone`
/// to prevent accidental exposure. Key bytes are zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey(pub [u8; 32]);

impl PrivateKey {
    /// Parse a `0x`-prefixed or bare 64 character hex string.
    pub fn from_hex(raw: &str) -> Result<Self, GridError> {
        let digits = raw.trim();
        let digits = digits.strip_prefix("0x").unwrap_or(digits);
        let mut decoded = hex::decode(digits)
            .map_err(|_| GridError::BadRequest("private key is not valid hex".to_string()))?;
        if decoded.len() != 32 {
            decoded.zeroize();
            return Err(GridError::BadRequest(
                "private key must be 32 bytes".to_string(),
            ));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        decoded.zeroize();
        Ok(Self(bytes))
    }
}
