//! On-disk schema version stamp.

use tokengrid_store::MetaStore;

use crate::LmdbError;

/// Layout written by this build.
pub const SCHEMA_VERSION: u32 = 1;

/// Stamp a fresh database with [`SCHEMA_VERSION`]; refuse any other stamp.
pub fn ensure_schema(meta: &impl MetaStore) -> Result<(), LmdbError> {
    let found = meta
        .get_schema_version()
        .map_err(|e| LmdbError::Heed(e.to_string()))?;
    match found {
        0 => {
            meta.set_schema_version(SCHEMA_VERSION)
                .map_err(|e| LmdbError::Heed(e.to_string()))?;
            tracing::info!(version = SCHEMA_VERSION, "stamped new database");
            Ok(())
        }
        SCHEMA_VERSION => Ok(()),
        other => Err(LmdbError::Heed(format!(
            "database schema version {other} is not supported (expected {SCHEMA_VERSION})"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;

    #[test]
    fn fresh_environment_is_stamped() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16, 1 << 24).unwrap();
        assert_eq!(env.store().get_schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn stamped_database_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16, 1 << 24).unwrap();
        let store = env.store();
        ensure_schema(&store).unwrap();
        assert_eq!(store.get_schema_version().unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn foreign_stamp_is_refused() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16, 1 << 24).unwrap();
        let store = env.store();
        store.set_schema_version(SCHEMA_VERSION + 1).unwrap();
        let err = ensure_schema(&store).unwrap_err();
        assert!(err.to_string().contains("not supported"));
    }
}
