use thiserror::Error;
use tokengrid_store_lmdb::LmdbError;
use tokengrid_types::GridError;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue storage error: {0}")]
    Storage(#[from] LmdbError),

    #[error("invalid message body: {0}")]
    InvalidBody(String),

    #[error("invalid queue config: {0}")]
    InvalidConfig(String),

    #[error("queue closed")]
    Closed,
}

impl From<heed::Error> for QueueError {
    fn from(e: heed::Error) -> Self {
        QueueError::Storage(e.into())
    }
}

impl From<bincode::Error> for QueueError {
    fn from(e: bincode::Error) -> Self {
        QueueError::Storage(e.into())
    }
}

impl From<QueueError> for GridError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::InvalidBody(msg) => GridError::BadRequest(format!("unhandled message: {msg}")),
            other => GridError::Internal(other.to_string()),
        }
    }
}
