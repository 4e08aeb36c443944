//! Entity types and abstract storage traits for the TokenGrid mirror.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The rest of the codebase depends only on the traits.

pub mod base_image;
pub mod error;
pub mod grid_item;
pub mod image;
pub mod meta;
pub mod network_update;
pub mod offchain;

pub use base_image::{BaseImage, BaseImageStore};
pub use error::StoreError;
pub use grid_item::{GridItem, GridItemOrder, GridItemQuery, GridItemStore};
pub use image::{Image, ImageStore, ImageVariant};
pub use meta::MetaStore;
pub use network_update::{NetworkUpdate, NetworkUpdateStore};
pub use offchain::{OffchainContent, OffchainContentStore, OffchainPendingContent, PendingStatus};

/// Every entity store behind one object, shared across components as
/// `Arc<dyn Store>`.
pub trait Store:
    GridItemStore
    + BaseImageStore
    + NetworkUpdateStore
    + OffchainContentStore
    + ImageStore
    + Send
    + Sync
{
}

impl<T> Store for T where
    T: GridItemStore
        + BaseImageStore
        + NetworkUpdateStore
        + OffchainContentStore
        + ImageStore
        + Send
        + Sync
{
}
