use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order {0} not found")]
    NotFound(Uuid),
    #[error("storage error: {0}")]
    Persistence(#[from] diesel::result::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<bb8::RunError<diesel_async::pooled_connection::PoolError>> for StoreError {
    fn from(e: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("checkout rejected: {0}")]
    Invalid(String),
    #[error("failed to persist order: {0}")]
    Failed(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing credential: {0} must be set")]
    MissingCredential(&'static str),
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Checkout(#[from] CheckoutError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("invalid request: {0}")]
    Validation(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Checkout(CheckoutError::Invalid(reason)) => {
                (StatusCode::BAD_REQUEST, reason.clone())
            }
            ApiError::Checkout(CheckoutError::Failed(e)) => {
                error!("Checkout failed: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "order could not be persisted".to_string(),
                )
            }
            ApiError::Store(StoreError::NotFound(id)) => {
                (StatusCode::NOT_FOUND, format!("order {} not found", id))
            }
            ApiError::Store(e) => {
                error!("Storage error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage error".to_string(),
                )
            }
            ApiError::Validation(reason) => (StatusCode::BAD_REQUEST, reason.clone()),
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
