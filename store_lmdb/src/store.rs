//! The LMDB-backed store handle.

use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, RoTxn, RwTxn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::LmdbError;

/// Implements every `tokengrid-store` trait over one environment.
///
/// Each trait lives in its own module; this struct only holds handles.
#[derive(Clone)]
pub struct LmdbStore {
    pub(crate) env: Arc<Env>,
    pub(crate) grid_items_db: Database<Bytes, Bytes>,
    pub(crate) base_images_db: Database<Bytes, Bytes>,
    pub(crate) network_updates_db: Database<Bytes, Bytes>,
    pub(crate) offchain_pending_db: Database<Bytes, Bytes>,
    pub(crate) offchain_applied_db: Database<Bytes, Bytes>,
    pub(crate) images_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbStore {
    /// Bump and return a named id sequence stored in the meta database.
    /// Sequences start at 1.
    pub(crate) fn next_sequence(&self, wtxn: &mut RwTxn, name: &str) -> Result<u64, LmdbError> {
        let key = format!("seq:{name}");
        let current = match self.meta_db.get(&**wtxn, key.as_bytes())? {
            Some(bytes) => {
                let arr: [u8; 8] = bytes.try_into().map_err(|_| {
                    LmdbError::Serialization(format!("sequence '{name}' has unexpected length"))
                })?;
                u64::from_be_bytes(arr)
            }
            None => 0,
        };
        let next = current + 1;
        self.meta_db
            .put(wtxn, key.as_bytes(), &next.to_be_bytes())?;
        Ok(next)
    }
}

pub(crate) fn get_value<T: DeserializeOwned>(
    db: &Database<Bytes, Bytes>,
    txn: &RoTxn,
    key: &[u8],
) -> Result<Option<T>, LmdbError> {
    match db.get(txn, key)? {
        Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
        None => Ok(None),
    }
}

pub(crate) fn put_value<T: Serialize>(
    db: &Database<Bytes, Bytes>,
    wtxn: &mut RwTxn,
    key: &[u8],
    value: &T,
) -> Result<(), LmdbError> {
    let bytes = bincode::serialize(value)?;
    db.put(wtxn, key, &bytes)?;
    Ok(())
}

/// Decode every value under `prefix`, in key order.
pub(crate) fn scan_prefix<T: DeserializeOwned>(
    db: &Database<Bytes, Bytes>,
    txn: &RoTxn,
    prefix: &[u8],
) -> Result<Vec<T>, LmdbError> {
    let mut out = Vec::new();
    for entry in db.prefix_iter(txn, prefix)? {
        let (_, bytes) = entry?;
        out.push(bincode::deserialize(bytes)?);
    }
    Ok(out)
}
