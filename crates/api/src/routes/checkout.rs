//! Checkout endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use storage::Store;
use storefront::CompletedPurchase;

use super::AppState;
use crate::error::ApiError;
use crate::extract::CurrentCustomer;

/// POST /checkout
///
/// Responds once the order is committed; the receipt goes out in the
/// background.
#[tracing::instrument(skip(state))]
pub async fn complete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer_id): CurrentCustomer,
) -> Result<(StatusCode, Json<CompletedPurchase>), ApiError> {
    let purchase = state.checkout.complete_purchase(customer_id).await?;
    Ok((StatusCode::CREATED, Json(purchase)))
}
