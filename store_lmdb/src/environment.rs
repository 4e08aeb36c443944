//! LMDB environment setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RwTxn};

use crate::schema::ensure_schema;
use crate::store::LmdbStore;
use crate::LmdbError;

pub(crate) const GRID_ITEMS_DB: &str = "grid_items";
pub(crate) const BASE_IMAGES_DB: &str = "base_images";
pub(crate) const NETWORK_UPDATES_DB: &str = "network_updates";
pub(crate) const OFFCHAIN_PENDING_DB: &str = "offchain_pending";
pub(crate) const OFFCHAIN_APPLIED_DB: &str = "offchain_applied";
pub(crate) const IMAGES_DB: &str = "images";
pub(crate) const META_DB: &str = "meta";

/// Open (creating if needed) a heed environment at `path`.
///
/// Shared with other crates that keep their own LMDB files (the work queue).
pub fn open_env(path: &Path, max_dbs: u32, map_size: usize) -> Result<Arc<Env>, LmdbError> {
    std::fs::create_dir_all(path)?;
    // SAFETY: the environment is opened once per path per process and shared
    // through the returned Arc; the file is not modified by other means.
    let env = unsafe {
        EnvOpenOptions::new()
            .map_size(map_size)
            .max_dbs(max_dbs)
            .open(path)?
    };
    Ok(Arc::new(env))
}

/// Create a named bytes→bytes database inside an open write transaction.
pub fn create_bytes_db(
    env: &Env,
    wtxn: &mut RwTxn,
    name: &str,
) -> Result<Database<Bytes, Bytes>, LmdbError> {
    Ok(env.create_database(wtxn, Some(name))?)
}

/// Wraps the LMDB environment and all database handles of the mirror.
pub struct LmdbEnvironment {
    path: PathBuf,
    env: Arc<Env>,
    store: LmdbStore,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path, create every
    /// database and check its schema stamp.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        let env = open_env(path, max_dbs, map_size)?;

        let mut wtxn = env.write_txn()?;
        let store = LmdbStore {
            env: Arc::clone(&env),
            grid_items_db: create_bytes_db(&env, &mut wtxn, GRID_ITEMS_DB)?,
            base_images_db: create_bytes_db(&env, &mut wtxn, BASE_IMAGES_DB)?,
            network_updates_db: create_bytes_db(&env, &mut wtxn, NETWORK_UPDATES_DB)?,
            offchain_pending_db: create_bytes_db(&env, &mut wtxn, OFFCHAIN_PENDING_DB)?,
            offchain_applied_db: create_bytes_db(&env, &mut wtxn, OFFCHAIN_APPLIED_DB)?,
            images_db: create_bytes_db(&env, &mut wtxn, IMAGES_DB)?,
            meta_db: create_bytes_db(&env, &mut wtxn, META_DB)?,
        };
        wtxn.commit()?;

        ensure_schema(&store)?;
        tracing::info!(path = %path.display(), "opened mirror database");

        Ok(Self {
            path: path.to_path_buf(),
            env,
            store,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    /// A handle implementing every store trait. Handles are cheap to clone.
    pub fn store(&self) -> LmdbStore {
        self.store.clone()
    }
}
