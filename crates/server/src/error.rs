//! Unified error handling for the HTTP surface.
//!
//! Only client-side problems map to error responses here. Remote cart
//! service failures never surface as HTTP errors: the engine absorbs them
//! into per-item sync state, and its warnings reach Sentry through the
//! tracing integration installed in `main`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use trolley_core::CartError;

/// Application-level error type for the trolley server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Cart operation rejected by the engine.
    #[error("Cart error: {0}")]
    Cart(#[from] CartError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Cart(CartError::ItemNotFound(_)) => StatusCode::NOT_FOUND,
            Self::Cart(CartError::InvalidQuantity) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        };

        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use trolley_core::{CartRef, ServerId};

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::Cart(CartError::InvalidQuantity);
        assert_eq!(err.to_string(), "Cart error: quantity must be at least 1");

        let err = AppError::BadRequest("nothing to update".to_string());
        assert_eq!(err.to_string(), "Bad request: nothing to update");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::Cart(CartError::ItemNotFound(CartRef::Server(
                ServerId::new("42")
            )))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Cart(CartError::InvalidQuantity)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
    }
}
