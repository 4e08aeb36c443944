use ethers::providers::{ProviderError, RpcError};
use ethers::signers::WalletError;
use thiserror::Error;
use tokengrid_types::GridError;

use crate::abi::AbiError;

#[derive(Debug, Error)]
pub enum ChainError {
    /// The node answered with a JSON-RPC error object.
    #[error("node rejected request: {0}")]
    Rpc(String),

    #[error("RPC endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("RPC request failed: {0}")]
    RequestFailed(String),

    #[error("invalid RPC response: {0}")]
    InvalidResponse(String),

    #[error("no endpoint configured for network '{0}'")]
    UnknownNetwork(String),

    #[error("no contract registered for network '{0}'")]
    UnknownContract(String),

    #[error("operation {0} is not bound for this contract")]
    UnboundOperation(String),

    #[error("contract configuration error: {0}")]
    Config(String),

    #[error("ABI error: {0}")]
    Abi(#[from] AbiError),

    #[error("signing key error: {0}")]
    Wallet(#[from] WalletError),
}

impl ChainError {
    /// Transport-level failures; safe to retry for reads.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::RequestFailed(_))
    }
}

impl From<ProviderError> for ChainError {
    fn from(e: ProviderError) -> Self {
        if let Some(response) = e.as_error_response() {
            return ChainError::Rpc(response.message.clone());
        }
        if e.is_serde_error() {
            return ChainError::InvalidResponse(e.to_string());
        }
        ChainError::RequestFailed(e.to_string())
    }
}

impl From<ChainError> for GridError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::Rpc(message) => GridError::BadRequest(message),
            ChainError::UnknownNetwork(_) | ChainError::UnknownContract(_) => {
                GridError::NotFound(e.to_string())
            }
            ChainError::Abi(AbiError::TypeMismatch { .. } | AbiError::ArgumentCount { .. })
            | ChainError::Wallet(_) => GridError::BadRequest(e.to_string()),
            _ => GridError::Internal(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokengrid_types::ErrorKind;

    #[test]
    fn node_errors_are_bad_requests_with_node_text() {
        let err: GridError = ChainError::Rpc("execution reverted: nonexistent token".into()).into();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(err.message(), "execution reverted: nonexistent token");
    }

    #[test]
    fn transport_errors_are_internal_and_transient() {
        let err = ChainError::Unreachable("timed out".into());
        assert!(err.is_transient());
        assert_eq!(GridError::from(err).kind(), ErrorKind::InternalServerError);
    }

    #[test]
    fn unknown_contract_is_not_found() {
        let err: GridError = ChainError::UnknownContract("devnet".into()).into();
        assert!(err.is_not_found());
    }

    #[test]
    fn provider_serde_errors_are_invalid_responses() {
        let serde_err = serde_json::from_str::<u64>("\"x\"").unwrap_err();
        let err = ChainError::from(ProviderError::SerdeJson(serde_err));
        assert!(matches!(err, ChainError::InvalidResponse(_)));
        assert!(!err.is_transient());
    }
}
