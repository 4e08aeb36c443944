//! LMDB storage backend for the TokenGrid mirror.
//!
//! Implements all storage traits from `tokengrid-store` using the `heed` LMDB
//! bindings. Each entity maps to one LMDB database within a single
//! environment; [`LmdbStore`] is the handle that implements every trait.

pub mod base_image;
pub mod environment;
pub mod error;
pub mod grid_item;
pub mod image;
pub mod integrity;
mod keys;
pub mod meta;
pub mod offchain;
pub mod schema;
pub mod store;

pub use environment::{create_bytes_db, open_env, LmdbEnvironment};
pub use error::LmdbError;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
pub use store::LmdbStore;
