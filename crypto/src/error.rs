use thiserror::Error;
use tokengrid_types::GridError;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid private key")]
    InvalidPrivateKey,

    #[error("invalid signature encoding: {0}")]
    InvalidSignature(String),

    #[error("invalid recovery id: {0}")]
    InvalidRecoveryId(u8),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("failed to recover public key")]
    RecoveryFailed,
}

impl From<CryptoError> for GridError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::InvalidSignature(_)
            | CryptoError::InvalidRecoveryId(_)
            | CryptoError::RecoveryFailed => GridError::BadRequest(e.to_string()),
            CryptoError::InvalidPrivateKey | CryptoError::SigningFailed(_) => {
                GridError::Internal(e.to_string())
            }
        }
    }
}
