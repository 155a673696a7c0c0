//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::CustomerId;

use crate::error::ApiError;

/// Header carrying the authenticated customer, set by the auth gateway.
pub const CUSTOMER_HEADER: &str = "x-customer-id";

/// The customer making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentCustomer(pub CustomerId);

impl<S: Send + Sync> FromRequestParts<S> for CurrentCustomer {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(CUSTOMER_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Sign in to continue.".to_string()))?;
        let id = value
            .to_str()
            .ok()
            .and_then(|raw| raw.trim().parse().ok())
            .ok_or_else(|| ApiError::BadRequest("Invalid customer id".to_string()))?;
        Ok(CurrentCustomer(id))
    }
}
