//! Base image storage trait.

use serde::{Deserialize, Serialize};
use tokengrid_types::{Network, Timestamp};

use crate::StoreError;

/// URL of the latest rendered composite of a network's whole grid.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseImage {
    pub network: Network,
    pub url: String,
    pub created_date: Timestamp,
    pub updated_date: Timestamp,
}

pub trait BaseImageStore {
    fn get_base_image(&self, network: &Network) -> Result<BaseImage, StoreError>;

    /// Insert or replace the network's base image.
    fn put_base_image(&self, image: &BaseImage) -> Result<(), StoreError>;
}
