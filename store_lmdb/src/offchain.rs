//! LMDB implementation of OffchainContentStore.
//!
//! Pending rows: `network ++ 0x00 ++ pending_id_be`.
//! Applied rows: `network ++ 0x00 ++ group_id_be`, one per group.

use tokengrid_store::{
    OffchainContent, OffchainContentStore, OffchainPendingContent, PendingStatus, StoreError,
};
use tokengrid_types::{Network, TokenId};

use crate::keys::{network_prefix, network_u64_key};
use crate::store::{get_value, put_value, scan_prefix, LmdbStore};
use crate::LmdbError;

const PENDING_SEQUENCE: &str = "offchain_pending";

impl OffchainContentStore for LmdbStore {
    fn create_pending(
        &self,
        pending: &OffchainPendingContent,
    ) -> Result<OffchainPendingContent, StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let mut stored = pending.clone();
        stored.id = self.next_sequence(&mut wtxn, PENDING_SEQUENCE)?;
        let key = network_u64_key(&stored.network, stored.id);
        put_value(&self.offchain_pending_db, &mut wtxn, &key, &stored)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(stored)
    }

    fn pending_by_status(
        &self,
        network: &Network,
        status: PendingStatus,
    ) -> Result<Vec<OffchainPendingContent>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let rows: Vec<OffchainPendingContent> =
            scan_prefix(&self.offchain_pending_db, &rtxn, &network_prefix(network))?;
        Ok(rows.into_iter().filter(|r| r.status == status).collect())
    }

    fn get_applied(
        &self,
        network: &Network,
        group_id: TokenId,
    ) -> Result<OffchainContent, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let applied = get_value(
            &self.offchain_applied_db,
            &rtxn,
            &network_u64_key(network, group_id),
        )?
        .ok_or_else(|| LmdbError::NotFound(format!("applied content for {network}/{group_id}")))?;
        Ok(applied)
    }

    fn record_application(
        &self,
        applied: Option<&OffchainContent>,
        touched: &[OffchainPendingContent],
    ) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        for row in touched {
            let key = network_u64_key(&row.network, row.id);
            let stored: OffchainPendingContent = get_value(&self.offchain_pending_db, &wtxn, &key)?
                .ok_or_else(|| LmdbError::NotFound(format!("pending content {}", row.id)))?;
            if stored.status != PendingStatus::Pending {
                return Err(LmdbError::Duplicate(format!(
                    "pending content {} is already {:?}",
                    row.id, stored.status
                ))
                .into());
            }
            put_value(&self.offchain_pending_db, &mut wtxn, &key, row)?;
        }
        if let Some(applied) = applied {
            let key = network_u64_key(&applied.network, applied.group_id);
            let current: Option<OffchainContent> =
                get_value(&self.offchain_applied_db, &wtxn, &key)?;
            if let Some(current) = current.filter(|c| c.block_number >= applied.block_number) {
                return Err(LmdbError::Duplicate(format!(
                    "{}/{} already applied at block {}",
                    applied.network, applied.group_id, current.block_number
                ))
                .into());
            }
            put_value(&self.offchain_applied_db, &mut wtxn, &key, applied)?;
        }
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;
    use tokengrid_types::{Address, Timestamp};

    fn pending(block_number: u64) -> OffchainPendingContent {
        OffchainPendingContent {
            id: 0,
            network: Network::parse("testnet").unwrap(),
            group_id: 7,
            width: 1,
            height: 1,
            content_urls: vec!["https://c/1.png".into()],
            block_number,
            signature: "0x00".into(),
            signer: Address::ZERO,
            status: PendingStatus::Pending,
            created_date: Timestamp::new(1),
            updated_date: Timestamp::new(1),
            applied_date: None,
        }
    }

    #[test]
    fn application_updates_rows_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16, 1 << 24).unwrap();
        let store = env.store();
        let network = Network::parse("testnet").unwrap();

        let mut low = store.create_pending(&pending(10)).unwrap();
        let mut high = store.create_pending(&pending(12)).unwrap();
        assert_eq!(store.pending_by_status(&network, PendingStatus::Pending).unwrap().len(), 2);

        high.status = PendingStatus::Applied;
        high.applied_date = Some(Timestamp::new(5));
        low.status = PendingStatus::Superseded;
        let applied = OffchainContent::from_pending(&high, Timestamp::new(5));
        store
            .record_application(Some(&applied), &[high.clone(), low.clone()])
            .unwrap();

        assert!(store.pending_by_status(&network, PendingStatus::Pending).unwrap().is_empty());
        let superseded = store
            .pending_by_status(&network, PendingStatus::Superseded)
            .unwrap();
        assert_eq!(superseded, vec![low]);
        assert_eq!(store.get_applied(&network, 7).unwrap().block_number, 12);
    }

    #[test]
    fn unknown_pending_row_aborts_application() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16, 1 << 24).unwrap();
        let store = env.store();
        let mut ghost = pending(3);
        ghost.id = 99;
        let applied = OffchainContent::from_pending(&ghost, Timestamp::new(5));
        assert!(store.record_application(Some(&applied), &[ghost]).is_err());
        assert!(store
            .get_applied(&Network::parse("testnet").unwrap(), 7)
            .unwrap_err()
            .is_not_found());
    }

    #[test]
    fn older_application_cannot_replace_newer_record() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16, 1 << 24).unwrap();
        let store = env.store();
        let network = Network::parse("testnet").unwrap();

        let low = store.create_pending(&pending(10)).unwrap();
        let high = store.create_pending(&pending(12)).unwrap();
        // Two workers read the same snapshot; one decides on 12 and commits.
        let mut high_applied = high.clone();
        high_applied.status = PendingStatus::Applied;
        let mut low_superseded = low.clone();
        low_superseded.status = PendingStatus::Superseded;
        store
            .record_application(
                Some(&OffchainContent::from_pending(&high_applied, Timestamp::new(5))),
                &[high_applied, low_superseded.clone()],
            )
            .unwrap();

        // The other worker only saw 10 and now tries to apply it.
        let mut low_applied = low.clone();
        low_applied.status = PendingStatus::Applied;
        let err = store
            .record_application(
                Some(&OffchainContent::from_pending(&low_applied, Timestamp::new(6))),
                &[low_applied],
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)), "{err:?}");

        assert_eq!(store.get_applied(&network, 7).unwrap().block_number, 12);
        assert_eq!(
            store.pending_by_status(&network, PendingStatus::Superseded).unwrap(),
            vec![low_superseded]
        );
    }

    #[test]
    fn rows_decided_elsewhere_abort_the_whole_application() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 16, 1 << 24).unwrap();
        let store = env.store();
        let network = Network::parse("testnet").unwrap();

        let first = store.create_pending(&pending(10)).unwrap();
        let second = store.create_pending(&pending(14)).unwrap();
        let mut superseded = first.clone();
        superseded.status = PendingStatus::Superseded;
        store.record_application(None, &[superseded]).unwrap();

        let mut winner = second.clone();
        winner.status = PendingStatus::Applied;
        let mut loser = first.clone();
        loser.status = PendingStatus::Superseded;
        let err = store
            .record_application(
                Some(&OffchainContent::from_pending(&winner, Timestamp::new(6))),
                &[winner, loser],
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)), "{err:?}");

        // Nothing from the refused transaction was written.
        assert!(store.get_applied(&network, 7).unwrap_err().is_not_found());
        assert_eq!(
            store.pending_by_status(&network, PendingStatus::Pending).unwrap(),
            vec![second]
        );
    }
}
