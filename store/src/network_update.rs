//! Block checkpoint storage trait.

use serde::{Deserialize, Serialize};
use tokengrid_types::{BlockNumber, Network, Timestamp};

use crate::StoreError;

/// Latest block number the sync engine has fully processed for a network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkUpdate {
    pub network: Network,
    pub block_number: BlockNumber,
    pub created_date: Timestamp,
    pub updated_date: Timestamp,
}

/// Owned by the sync engine; nothing else writes checkpoints.
pub trait NetworkUpdateStore {
    fn get_network_update(&self, network: &Network) -> Result<NetworkUpdate, StoreError>;

    fn put_network_update(&self, update: &NetworkUpdate) -> Result<(), StoreError>;
}
