//! Closed error taxonomy shared across crates.
//!
//! Component boundaries (chain client, store, queue) translate their own error
//! enums into [`GridError`]. Nothing below the HTTP adapter knows about status
//! codes; it only sees the [`ErrorKind`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Every failure falls into exactly one of these kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    DuplicateValue,
    InternalServerError,
}

impl ErrorKind {
    /// Client errors are caused by the caller or its input; retrying the
    /// same request will not help.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::InternalServerError)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadRequest => "BadRequest",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::NotFound => "NotFound",
            Self::DuplicateValue => "DuplicateValue",
            Self::InternalServerError => "InternalServerError",
        }
    }
}

/// Error type returned by every fallible core operation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("duplicate value: {0}")]
    DuplicateValue(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type GridResult<T> = Result<T, GridError>;

impl GridError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadRequest(_) => ErrorKind::BadRequest,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::DuplicateValue(_) => ErrorKind::DuplicateValue,
            Self::Internal(_) => ErrorKind::InternalServerError,
        }
    }

    /// The bare message without the kind prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::DuplicateValue(m)
            | Self::Internal(m) => m,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
