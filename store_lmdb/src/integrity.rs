//! LMDB database integrity checks.
//!
//! Run by the daemon's `store check` command to detect corruption before a
//! worker starts writing.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::Env;

use crate::environment::{
    BASE_IMAGES_DB, GRID_ITEMS_DB, IMAGES_DB, META_DB, NETWORK_UPDATES_DB, OFFCHAIN_APPLIED_DB,
    OFFCHAIN_PENDING_DB,
};
use crate::LmdbError;

/// Summary of an integrity check run.
#[derive(Debug)]
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub total_entries: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Database names that every mirror environment contains.
pub const EXPECTED_DATABASES: &[&str] = &[
    GRID_ITEMS_DB,
    BASE_IMAGES_DB,
    NETWORK_UPDATES_DB,
    OFFCHAIN_PENDING_DB,
    OFFCHAIN_APPLIED_DB,
    IMAGES_DB,
    META_DB,
];

/// Opens each expected database and counts its entries. Read failures and
/// missing databases are recorded in the report rather than returned.
pub fn check_integrity(env: &Arc<Env>) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport {
        databases_checked: 0,
        total_entries: 0,
        errors: Vec::new(),
    };

    let rtxn = env.read_txn()?;
    for &db_name in EXPECTED_DATABASES {
        match env.open_database::<Bytes, Bytes>(&rtxn, Some(db_name)) {
            Ok(Some(db)) => {
                report.databases_checked += 1;
                match db.len(&rtxn) {
                    Ok(count) => report.total_entries += count,
                    Err(e) => report
                        .errors
                        .push(format!("failed to read database '{db_name}': {e}")),
                }
            }
            Ok(None) => report.errors.push(format!("database '{db_name}' is missing")),
            Err(e) => report
                .errors
                .push(format!("failed to open database '{db_name}': {e}")),
        }
    }

    Ok(report)
}

/// Returns `Ok(())` for a fresh (nonexistent) directory and an error if the
/// directory exists but `data.mdb` is missing.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    let data_file = path.join("data.mdb");
    if !data_file.exists() {
        return Err(format!(
            "LMDB directory exists but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}
