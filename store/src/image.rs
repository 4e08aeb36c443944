//! Ingested image storage trait.

use serde::{Deserialize, Serialize};
use tokengrid_types::Timestamp;

use crate::StoreError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageVariant {
    pub width: u32,
    pub height: u32,
    pub url: String,
}

/// A source image and the resized variants produced for it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    pub image_id: String,
    pub original_url: String,
    pub variants: Vec<ImageVariant>,
    pub created_date: Timestamp,
}

impl Image {
    /// URL of the smallest variant covering `width × height`, or the original
    /// when no variant is large enough.
    pub fn select_variant(&self, width: u32, height: u32) -> &str {
        self.variants
            .iter()
            .filter(|v| v.width >= width && v.height >= height)
            .min_by_key(|v| (u64::from(v.width) * u64::from(v.height), v.width))
            .map(|v| v.url.as_str())
            .unwrap_or(&self.original_url)
    }
}

pub trait ImageStore {
    fn get_image(&self, image_id: &str) -> Result<Image, StoreError>;

    fn put_image(&self, image: &Image) -> Result<(), StoreError>;
}
