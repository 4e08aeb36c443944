//! LMDB implementation of GridItemStore.
//!
//! Key format: `network ++ 0x00 ++ token_id_be`. Uniqueness of
//! `(network, token_id)` is a check-and-put inside one write transaction;
//! LMDB serialises writers, so two creators cannot both succeed.

use tokengrid_store::{GridItem, GridItemQuery, GridItemStore, StoreError};
use tokengrid_types::{Network, TokenId};

use crate::keys::{network_prefix, network_u64_key};
use crate::store::{get_value, put_value, scan_prefix, LmdbStore};
use crate::LmdbError;

const GRID_ITEM_SEQUENCE: &str = "grid_item";

fn describe(network: &Network, token_id: TokenId) -> String {
    format!("grid item {network}/{token_id}")
}

impl GridItemStore for LmdbStore {
    fn get_grid_item(&self, network: &Network, token_id: TokenId) -> Result<GridItem, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let item = get_value(&self.grid_items_db, &rtxn, &network_u64_key(network, token_id))?
            .ok_or_else(|| LmdbError::NotFound(describe(network, token_id)))?;
        Ok(item)
    }

    fn create_grid_item(&self, item: &GridItem) -> Result<GridItem, StoreError> {
        let key = network_u64_key(&item.network, item.token_id);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let exists = self
            .grid_items_db
            .get(&wtxn, &key)
            .map_err(LmdbError::from)?
            .is_some();
        if exists {
            return Err(LmdbError::Duplicate(describe(&item.network, item.token_id)).into());
        }
        let mut stored = item.clone();
        stored.grid_item_id = self.next_sequence(&mut wtxn, GRID_ITEM_SEQUENCE)?;
        put_value(&self.grid_items_db, &mut wtxn, &key, &stored)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(stored)
    }

    fn update_grid_item(&self, item: &GridItem) -> Result<(), StoreError> {
        let key = network_u64_key(&item.network, item.token_id);
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        let exists = self
            .grid_items_db
            .get(&wtxn, &key)
            .map_err(LmdbError::from)?
            .is_some();
        if !exists {
            return Err(LmdbError::NotFound(describe(&item.network, item.token_id)).into());
        }
        put_value(&self.grid_items_db, &mut wtxn, &key, item)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }

    fn query_grid_items(
        &self,
        network: &Network,
        query: &GridItemQuery,
    ) -> Result<Vec<GridItem>, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let items: Vec<GridItem> =
            scan_prefix(&self.grid_items_db, &rtxn, &network_prefix(network))?;
        Ok(query.apply(items))
    }

    fn grid_item_count(&self, network: &Network) -> Result<u64, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let mut count = 0u64;
        for entry in self
            .grid_items_db
            .prefix_iter(&rtxn, &network_prefix(network))
            .map_err(LmdbError::from)?
        {
            entry.map_err(LmdbError::from)?;
            count += 1;
        }
        Ok(count)
    }
}
