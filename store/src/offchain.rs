//! Off-chain content storage trait.
//!
//! A content request is stored as an [`OffchainPendingContent`] row. Once
//! its authorising block is confirmed the winning row for a group becomes the
//! [`OffchainContent`] of record; competing rows are marked superseded.

use serde::{Deserialize, Serialize};
use tokengrid_types::{Address, BlockNumber, Network, Timestamp, TokenId};

use crate::StoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PendingStatus {
    Pending,
    Applied,
    Superseded,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffchainPendingContent {
    /// Assigned by the store on create.
    pub id: u64,
    pub network: Network,
    pub group_id: TokenId,
    pub width: u32,
    pub height: u32,
    pub content_urls: Vec<String>,
    pub block_number: BlockNumber,
    /// 65-byte `r‖s‖v` hex, as submitted.
    pub signature: String,
    pub signer: Address,
    pub status: PendingStatus,
    pub created_date: Timestamp,
    pub updated_date: Timestamp,
    pub applied_date: Option<Timestamp>,
}

/// The authoritative content assignment for one `(network, group_id)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffchainContent {
    pub network: Network,
    pub group_id: TokenId,
    pub width: u32,
    pub height: u32,
    pub content_urls: Vec<String>,
    pub block_number: BlockNumber,
    pub signature: String,
    pub signer: Address,
    /// Id of the pending row this record was applied from.
    pub pending_id: u64,
    pub created_date: Timestamp,
    pub applied_date: Timestamp,
}

impl OffchainContent {
    pub fn from_pending(pending: &OffchainPendingContent, applied_date: Timestamp) -> Self {
        Self {
            network: pending.network.clone(),
            group_id: pending.group_id,
            width: pending.width,
            height: pending.height,
            content_urls: pending.content_urls.clone(),
            block_number: pending.block_number,
            signature: pending.signature.clone(),
            signer: pending.signer,
            pending_id: pending.id,
            created_date: pending.created_date,
            applied_date,
        }
    }
}

pub trait OffchainContentStore {
    /// Insert a new pending row, assigning its id. Returns the stored row.
    fn create_pending(
        &self,
        pending: &OffchainPendingContent,
    ) -> Result<OffchainPendingContent, StoreError>;

    /// Rows of a network with the given status, in id order.
    fn pending_by_status(
        &self,
        network: &Network,
        status: PendingStatus,
    ) -> Result<Vec<OffchainPendingContent>, StoreError>;

    fn get_applied(
        &self,
        network: &Network,
        group_id: TokenId,
    ) -> Result<OffchainContent, StoreError>;

    /// Atomically persist the new status of every touched pending row and,
    /// when given, store `applied` as the group's record of truth.
    ///
    /// Fails with [`StoreError::Duplicate`] and writes nothing when a touched
    /// row is no longer pending or the group already holds a record at the
    /// same or a higher block.
    fn record_application(
        &self,
        applied: Option<&OffchainContent>,
        touched: &[OffchainPendingContent],
    ) -> Result<(), StoreError>;
}
