//! Work message envelope.
//!
//! On the wire every message is `{"command": "<NAME>", "content": {...}}`
//! with camelCase content fields.

use serde::{Deserialize, Serialize};
use tokengrid_types::{Network, TokenId};

use crate::QueueError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "command", content = "content", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Reconcile every token of a network.
    UpdateTokens { network: Network },
    /// Reconcile one token.
    UpdateToken {
        network: Network,
        #[serde(rename = "tokenId")]
        token_id: TokenId,
    },
    /// Ingest the current image of one token.
    UploadTokenImage {
        network: Network,
        #[serde(rename = "tokenId")]
        token_id: TokenId,
    },
    /// Scan new blocks for transfer and content-URI events.
    ProcessBlocks { network: Network },
    /// Apply confirmed off-chain content requests.
    ApplyOffchainContent { network: Network },
}

impl Message {
    pub fn update_tokens(network: &Network) -> Self {
        Self::UpdateTokens {
            network: network.clone(),
        }
    }

    pub fn update_token(network: &Network, token_id: TokenId) -> Self {
        Self::UpdateToken {
            network: network.clone(),
            token_id,
        }
    }

    pub fn upload_token_image(network: &Network, token_id: TokenId) -> Self {
        Self::UploadTokenImage {
            network: network.clone(),
            token_id,
        }
    }

    pub fn process_blocks(network: &Network) -> Self {
        Self::ProcessBlocks {
            network: network.clone(),
        }
    }

    pub fn apply_offchain_content(network: &Network) -> Self {
        Self::ApplyOffchainContent {
            network: network.clone(),
        }
    }

    /// Wire name of the command.
    pub fn command(&self) -> &'static str {
        match self {
            Self::UpdateTokens { .. } => "UPDATE_TOKENS",
            Self::UpdateToken { .. } => "UPDATE_TOKEN",
            Self::UploadTokenImage { .. } => "UPLOAD_TOKEN_IMAGE",
            Self::ProcessBlocks { .. } => "PROCESS_BLOCKS",
            Self::ApplyOffchainContent { .. } => "APPLY_OFFCHAIN_CONTENT",
        }
    }

    pub fn network(&self) -> &Network {
        match self {
            Self::UpdateTokens { network }
            | Self::UpdateToken { network, .. }
            | Self::UploadTokenImage { network, .. }
            | Self::ProcessBlocks { network }
            | Self::ApplyOffchainContent { network } => network,
        }
    }

    pub fn to_body(&self) -> Result<String, QueueError> {
        serde_json::to_string(self).map_err(|e| QueueError::InvalidBody(e.to_string()))
    }

    /// Parse a raw body. Unknown commands and malformed content both fail.
    pub fn parse(body: &str) -> Result<Self, QueueError> {
        serde_json::from_str(body).map_err(|e| QueueError::InvalidBody(e.to_string()))
    }
}

/// A delivered message. The receipt handle is only good for acknowledging
/// this particular lease.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeasedMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    /// 1 on first delivery.
    pub receive_count: u32,
}

impl LeasedMessage {
    pub fn message(&self) -> Result<Message, QueueError> {
        Message::parse(&self.body)
    }
}
