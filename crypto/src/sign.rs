//! Recoverable ECDSA signatures and signer recovery.

use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};
use tokengrid_types::Address;

use crate::hash::personal_message_hash;
use crate::keys::address_from_verifying_key;
use crate::CryptoError;

/// An ECDSA signature with the recovery bit, as produced by wallets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    /// 0 or 1.
    pub y_parity: u8,
}

impl RecoverableSignature {
    /// Parse the 65-byte `r‖s‖v` wire form. `v` may be 0/1 or 27/28.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != 65 {
            return Err(CryptoError::InvalidSignature(format!(
                "expected 65 bytes, got {}",
                bytes.len()
            )));
        }
        let y_parity = match bytes[64] {
            0 | 27 => 0,
            1 | 28 => 1,
            other => return Err(CryptoError::InvalidRecoveryId(other)),
        };
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, y_parity })
    }

    pub fn from_hex(raw: &str) -> Result<Self, CryptoError> {
        let digits = raw.strip_prefix("0x").unwrap_or(raw);
        let bytes = hex::decode(digits).map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// 65-byte `r‖s‖v` with `v` in {27, 28}.
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.y_parity + 27;
        out
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }
}

/// Recover the address that signed `digest`.
pub fn recover_signer(
    digest: &[u8; 32],
    signature: &RecoverableSignature,
) -> Result<Address, CryptoError> {
    let mut rs = [0u8; 64];
    rs[..32].copy_from_slice(&signature.r);
    rs[32..].copy_from_slice(&signature.s);
    let mut sig =
        Signature::from_slice(&rs).map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
    let mut recid = RecoveryId::from_byte(signature.y_parity)
        .ok_or(CryptoError::InvalidRecoveryId(signature.y_parity))?;

    // High-s signatures are valid on chain; flip to low-s and invert parity.
    if let Some(normalized) = sig.normalize_s() {
        sig = normalized;
        recid = RecoveryId::new(!recid.is_y_odd(), recid.is_x_reduced());
    }

    let key = VerifyingKey::recover_from_prehash(digest, &sig, recid)
        .map_err(|_| CryptoError::RecoveryFailed)?;
    Ok(address_from_verifying_key(&key))
}

/// Recover the signer of an EIP-191 `personal_sign` message.
pub fn recover_personal_signer(
    message: &[u8],
    signature: &RecoverableSignature,
) -> Result<Address, CryptoError> {
    recover_signer(&personal_message_hash(message), signature)
}
