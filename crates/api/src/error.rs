//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use storage::StorageError;
use storefront::{CheckoutError, StorefrontError};

const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Where the client should send the customer next.
pub const NEXT_BROWSE: &str = "browse";
pub const NEXT_CART: &str = "cart";

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// No customer identity on the request.
    Unauthorized(String),
    /// The request conflicts with current stock or policy.
    Conflict {
        message: String,
        next: Option<&'static str>,
    },
    /// Well-formed but cannot be acted on.
    Unprocessable {
        message: String,
        next: Option<&'static str>,
    },
    /// Internal server error. The detail is logged, never returned.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, next) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            ApiError::Conflict { message, next } => (StatusCode::CONFLICT, message, next),
            ApiError::Unprocessable { message, next } => {
                (StatusCode::UNPROCESSABLE_ENTITY, message, next)
            }
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    GENERIC_FAILURE.to_string(),
                    None,
                )
            }
        };

        let body = match next {
            Some(next) => serde_json::json!({ "error": message, "next": next }),
            None => serde_json::json!({ "error": message }),
        };
        (status, axum::Json(body)).into_response()
    }
}

fn storage_error(err: StorageError) -> ApiError {
    match &err {
        StorageError::NotFound { .. } => ApiError::NotFound(err.to_string()),
        StorageError::Conflict(_) => ApiError::Conflict {
            message: err.to_string(),
            next: None,
        },
        _ => ApiError::Internal(err.to_string()),
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::EmptyCart => ApiError::Unprocessable {
                message: err.to_string(),
                next: Some(NEXT_BROWSE),
            },
            CheckoutError::InsufficientStock { .. } | CheckoutError::FulfillmentUnavailable { .. } => {
                ApiError::Conflict {
                    message: err.to_string(),
                    next: Some(NEXT_CART),
                }
            }
            CheckoutError::Domain(err) => ApiError::Internal(err.to_string()),
            CheckoutError::Storage(err) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<StorefrontError> for ApiError {
    fn from(err: StorefrontError) -> Self {
        match err {
            StorefrontError::ProductNotFound(_) | StorefrontError::OrderNotFound(_) => {
                ApiError::NotFound(err.to_string())
            }
            StorefrontError::OutOfStock { .. } | StorefrontError::FulfillmentUnavailable { .. } => {
                ApiError::Conflict {
                    message: err.to_string(),
                    next: None,
                }
            }
            StorefrontError::Domain(err) => ApiError::BadRequest(err.to_string()),
            StorefrontError::Storage(err) => storage_error(err),
        }
    }
}
