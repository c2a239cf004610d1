//! HTTP error mapping. Every failure leaves as `{ "error": "<message>" }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

use pushcast_core::{PushError, RegistryError};

#[derive(Debug)]
pub enum ApiError {
    /// Malformed or incomplete request body. No side effect happened.
    BadRequest(String),
    /// VAPID material is missing, so sending is disabled.
    NotConfigured(String),
    Registry(RegistryError),
    Internal(String),
}

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        match e {
            RegistryError::InvalidEndpoint => ApiError::BadRequest(e.to_string()),
            other => ApiError::Registry(other),
        }
    }
}

impl From<PushError> for ApiError {
    fn from(e: PushError) -> Self {
        match e {
            PushError::NotConfigured(msg) => ApiError::NotConfigured(msg),
            PushError::Registry(e) => e.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotConfigured(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            ApiError::Registry(e) => {
                error!(error = %e, "Registry operation failed");
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
            ApiError::Internal(msg) => {
                error!(error = %msg, "Internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
