//! # Errors
//!
//! [`BackendError`] is what a store reports; [`ApiError`] is what a handler
//! returns. Every API error renders as `{"error": "<message>"}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Item {0} not found.")]
    NotFound(Uuid),

    #[error("Item data must be a JSON object.")]
    InvalidData,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("NLQ is disabled.")]
    Disabled,

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Disabled => StatusCode::NOT_FOUND,
            ApiError::Backend(BackendError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Backend(BackendError::InvalidData) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::Disabled.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(BackendError::NotFound(Uuid::nil())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(BackendError::InvalidData).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_backend_message_passes_through() {
        let err = ApiError::from(BackendError::InvalidData);
        assert_eq!(err.to_string(), "Item data must be a JSON object.");
    }
}
