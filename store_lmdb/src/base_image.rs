//! LMDB implementation of BaseImageStore and NetworkUpdateStore.
//!
//! Both are one row per network, keyed by the bare network name.

use tokengrid_store::{BaseImage, BaseImageStore, NetworkUpdate, NetworkUpdateStore, StoreError};
use tokengrid_types::Network;

use crate::keys::network_key;
use crate::store::{get_value, put_value, LmdbStore};
use crate::LmdbError;

impl BaseImageStore for LmdbStore {
    fn get_base_image(&self, network: &Network) -> Result<BaseImage, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let image = get_value(&self.base_images_db, &rtxn, &network_key(network))?
            .ok_or_else(|| LmdbError::NotFound(format!("base image for {network}")))?;
        Ok(image)
    }

    fn put_base_image(&self, image: &BaseImage) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        put_value(&self.base_images_db, &mut wtxn, &network_key(&image.network), image)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

impl NetworkUpdateStore for LmdbStore {
    fn get_network_update(&self, network: &Network) -> Result<NetworkUpdate, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let update = get_value(&self.network_updates_db, &rtxn, &network_key(network))?
            .ok_or_else(|| LmdbError::NotFound(format!("network update for {network}")))?;
        Ok(update)
    }

    fn put_network_update(&self, update: &NetworkUpdate) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        put_value(
            &self.network_updates_db,
            &mut wtxn,
            &network_key(&update.network),
            update,
        )?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
