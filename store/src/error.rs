use thiserror::Error;
use tokengrid_types::GridError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found: {0}")]
    NotFound(String),

    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("database is corrupted: {0}")]
    Corruption(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<StoreError> for GridError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(key) => GridError::NotFound(key),
            StoreError::Duplicate(key) => GridError::DuplicateValue(key),
            other => GridError::Internal(other.to_string()),
        }
    }
}
