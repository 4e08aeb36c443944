//! LMDB implementation of ImageStore. Keyed by image id.

use tokengrid_store::{Image, ImageStore, StoreError};

use crate::store::{get_value, put_value, LmdbStore};
use crate::LmdbError;

impl ImageStore for LmdbStore {
    fn get_image(&self, image_id: &str) -> Result<Image, StoreError> {
        let rtxn = self.env.read_txn().map_err(LmdbError::from)?;
        let image = get_value(&self.images_db, &rtxn, image_id.as_bytes())?
            .ok_or_else(|| LmdbError::NotFound(format!("image {image_id}")))?;
        Ok(image)
    }

    fn put_image(&self, image: &Image) -> Result<(), StoreError> {
        let mut wtxn = self.env.write_txn().map_err(LmdbError::from)?;
        put_value(&self.images_db, &mut wtxn, image.image_id.as_bytes(), image)?;
        wtxn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}
