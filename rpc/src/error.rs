//! RPC error types and their JSON rendering.
//!
//! This is the only place an [`ErrorKind`] becomes an HTTP status code.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tokengrid_types::{ErrorKind, GridError};

#[derive(Debug, Error)]
pub enum RpcError {
    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("metrics encoding failed: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

impl RpcError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Grid(e) => e.kind(),
            Self::InvalidRequest(_) => ErrorKind::BadRequest,
            Self::Metrics(_) | Self::Server(_) => ErrorKind::InternalServerError,
        }
    }

    fn message(&self) -> String {
        match self {
            Self::Grid(e) => e.message().to_string(),
            Self::InvalidRequest(m) => m.clone(),
            Self::Metrics(e) => e.to_string(),
            Self::Server(e) => e.to_string(),
        }
    }
}

impl From<tokengrid_store::StoreError> for RpcError {
    fn from(e: tokengrid_store::StoreError) -> Self {
        Self::Grid(e.into())
    }
}

impl From<tokengrid_chain::ChainError> for RpcError {
    fn from(e: tokengrid_chain::ChainError) -> Self {
        Self::Grid(e.into())
    }
}

impl From<tokengrid_queue::QueueError> for RpcError {
    fn from(e: tokengrid_queue::QueueError) -> Self {
        Self::Grid(e.into())
    }
}

impl From<JsonRejection> for RpcError {
    fn from(e: JsonRejection) -> Self {
        Self::InvalidRequest(e.body_text())
    }
}

impl From<QueryRejection> for RpcError {
    fn from(e: QueryRejection) -> Self {
        Self::InvalidRequest(e.body_text())
    }
}

pub fn status_code(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::BadRequest | ErrorKind::DuplicateValue => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Wire shape of every error response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub exception_type: String,
    pub message: String,
    pub status_code: u16,
}

impl From<&RpcError> for ErrorBody {
    fn from(e: &RpcError) -> Self {
        let kind = e.kind();
        Self {
            exception_type: format!("{}Exception", kind.as_str()),
            message: e.message(),
            status_code: status_code(kind).as_u16(),
        }
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        let body = ErrorBody::from(&self);
        if self.kind().is_client_error() {
            tracing::debug!(status = body.status_code, error = %self, "request rejected");
        } else {
            tracing::error!(status = body.status_code, error = %self, "request failed");
        }
        (status_code(self.kind()), Json(body)).into_response()
    }
}
