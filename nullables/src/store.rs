//! Nullable store: thread-safe in-memory storage for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokengrid_store::{
    BaseImage, BaseImageStore, GridItem, GridItemQuery, GridItemStore, Image, ImageStore,
    NetworkUpdate, NetworkUpdateStore, OffchainContent, OffchainContentStore,
    OffchainPendingContent, PendingStatus, StoreError,
};
use tokengrid_types::{Network, TokenId};

/// In-memory implementation of every store trait.
///
/// Counts mutations so tests can assert that a no-op reconciliation wrote
/// nothing.
#[derive(Default)]
pub struct NullStore {
    grid_items: Mutex<HashMap<(Network, TokenId), GridItem>>,
    base_images: Mutex<HashMap<Network, BaseImage>>,
    network_updates: Mutex<HashMap<Network, NetworkUpdate>>,
    pending: Mutex<HashMap<u64, OffchainPendingContent>>,
    applied: Mutex<HashMap<(Network, TokenId), OffchainContent>>,
    images: Mutex<HashMap<String, Image>>,
    /// Inserted in place of the next created item, which then fails as a duplicate.
    preempt: Mutex<Option<GridItem>>,
    /// Stored as the group's record just before the next application.
    racing_application: Mutex<Option<OffchainContent>>,
    next_id: AtomicU64,
    writes: AtomicU64,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutating calls that succeeded.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Simulate another worker creating `item` just before our next create.
    pub fn preempt_next_create(&self, item: GridItem) {
        *self.preempt.lock().unwrap() = Some(item);
    }

    /// Simulate another worker applying `record` just before our next
    /// `record_application`.
    pub fn race_next_application(&self, record: OffchainContent) {
        *self.racing_application.lock().unwrap() = Some(record);
    }

    /// Seed an item without counting it as a write.
    pub fn insert_grid_item(&self, mut item: GridItem) -> GridItem {
        if item.grid_item_id == 0 {
            item.grid_item_id = self.next_id();
        }
        self.grid_items
            .lock()
            .unwrap()
            .insert((item.network.clone(), item.token_id), item.clone());
        item
    }

    pub fn all_pending(&self) -> Vec<OffchainPendingContent> {
        let mut rows: Vec<_> = self.pending.lock().unwrap().values().cloned().collect();
        rows.sort_by_key(|r| r.id);
        rows
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn wrote(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

impl GridItemStore for NullStore {
    fn get_grid_item(&self, network: &Network, token_id: TokenId) -> Result<GridItem, StoreError> {
        self.grid_items
            .lock()
            .unwrap()
            .get(&(network.clone(), token_id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("grid item {network}/{token_id}")))
    }

    fn create_grid_item(&self, item: &GridItem) -> Result<GridItem, StoreError> {
        let key = (item.network.clone(), item.token_id);
        let preempted = self.preempt.lock().unwrap().take();
        if let Some(winner) = preempted {
            self.insert_grid_item(winner);
            return Err(StoreError::Duplicate(format!("grid item {}/{}", key.0, key.1)));
        }
        let mut items = self.grid_items.lock().unwrap();
        if items.contains_key(&key) {
            return Err(StoreError::Duplicate(format!("grid item {}/{}", key.0, key.1)));
        }
        let mut stored = item.clone();
        stored.grid_item_id = self.next_id();
        items.insert(key, stored.clone());
        self.wrote();
        Ok(stored)
    }

    fn update_grid_item(&self, item: &GridItem) -> Result<(), StoreError> {
        let mut items = self.grid_items.lock().unwrap();
        let key = (item.network.clone(), item.token_id);
        if !items.contains_key(&key) {
            return Err(StoreError::NotFound(format!("grid item {}/{}", key.0, key.1)));
        }
        items.insert(key, item.clone());
        self.wrote();
        Ok(())
    }

    fn query_grid_items(
        &self,
        network: &Network,
        query: &GridItemQuery,
    ) -> Result<Vec<GridItem>, StoreError> {
        let items = self.grid_items.lock().unwrap();
        Ok(query.apply(items.values().filter(|i| &i.network == network).cloned()))
    }

    fn grid_item_count(&self, network: &Network) -> Result<u64, StoreError> {
        Ok(self
            .grid_items
            .lock()
            .unwrap()
            .keys()
            .filter(|(n, _)| n == network)
            .count() as u64)
    }
}

impl BaseImageStore for NullStore {
    fn get_base_image(&self, network: &Network) -> Result<BaseImage, StoreError> {
        self.base_images
            .lock()
            .unwrap()
            .get(network)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("base image {network}")))
    }

    fn put_base_image(&self, image: &BaseImage) -> Result<(), StoreError> {
        self.base_images
            .lock()
            .unwrap()
            .insert(image.network.clone(), image.clone());
        self.wrote();
        Ok(())
    }
}

impl NetworkUpdateStore for NullStore {
    fn get_network_update(&self, network: &Network) -> Result<NetworkUpdate, StoreError> {
        self.network_updates
            .lock()
            .unwrap()
            .get(network)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("network update {network}")))
    }

    fn put_network_update(&self, update: &NetworkUpdate) -> Result<(), StoreError> {
        self.network_updates
            .lock()
            .unwrap()
            .insert(update.network.clone(), update.clone());
        self.wrote();
        Ok(())
    }
}

impl OffchainContentStore for NullStore {
    fn create_pending(
        &self,
        pending: &OffchainPendingContent,
    ) -> Result<OffchainPendingContent, StoreError> {
        let mut stored = pending.clone();
        stored.id = self.next_id();
        self.pending.lock().unwrap().insert(stored.id, stored.clone());
        self.wrote();
        Ok(stored)
    }

    fn pending_by_status(
        &self,
        network: &Network,
        status: PendingStatus,
    ) -> Result<Vec<OffchainPendingContent>, StoreError> {
        Ok(self
            .all_pending()
            .into_iter()
            .filter(|r| &r.network == network && r.status == status)
            .collect())
    }

    fn get_applied(
        &self,
        network: &Network,
        group_id: TokenId,
    ) -> Result<OffchainContent, StoreError> {
        self.applied
            .lock()
            .unwrap()
            .get(&(network.clone(), group_id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("applied content {network}/{group_id}")))
    }

    fn record_application(
        &self,
        applied: Option<&OffchainContent>,
        touched: &[OffchainPendingContent],
    ) -> Result<(), StoreError> {
        let mut pending = self.pending.lock().unwrap();
        let mut records = self.applied.lock().unwrap();
        if let Some(rival) = self.racing_application.lock().unwrap().take() {
            records.insert((rival.network.clone(), rival.group_id), rival);
        }
        for row in touched {
            let stored = pending
                .get(&row.id)
                .ok_or_else(|| StoreError::NotFound(format!("pending content {}", row.id)))?;
            if stored.status != PendingStatus::Pending {
                return Err(StoreError::Duplicate(format!(
                    "pending content {} is already {:?}",
                    row.id, stored.status
                )));
            }
        }
        if let Some(applied) = applied {
            let key = (applied.network.clone(), applied.group_id);
            if let Some(current) = records
                .get(&key)
                .filter(|c| c.block_number >= applied.block_number)
            {
                return Err(StoreError::Duplicate(format!(
                    "{}/{} already applied at block {}",
                    applied.network, applied.group_id, current.block_number
                )));
            }
            records.insert(key, applied.clone());
        }
        for row in touched {
            pending.insert(row.id, row.clone());
        }
        self.wrote();
        Ok(())
    }
}

impl ImageStore for NullStore {
    fn get_image(&self, image_id: &str) -> Result<Image, StoreError> {
        self.images
            .lock()
            .unwrap()
            .get(image_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("image {image_id}")))
    }

    fn put_image(&self, image: &Image) -> Result<(), StoreError> {
        self.images
            .lock()
            .unwrap()
            .insert(image.image_id.clone(), image.clone());
        self.wrote();
        Ok(())
    }
}
