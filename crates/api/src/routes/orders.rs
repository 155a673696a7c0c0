//! Customer order history and invoices.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use storage::Store;
use storefront::{Invoice, OrderHistory};

use super::AppState;
use crate::error::ApiError;
use crate::extract::CurrentCustomer;

/// GET /orders
#[tracing::instrument(skip(state))]
pub async fn history<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer_id): CurrentCustomer,
) -> Result<Json<OrderHistory>, ApiError> {
    Ok(Json(state.archive.history(customer_id).await?))
}

/// GET /orders/{order_id}
#[tracing::instrument(skip(state))]
pub async fn invoice<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer_id): CurrentCustomer,
    Path(order_id): Path<String>,
) -> Result<Json<Invoice>, ApiError> {
    Ok(Json(state.archive.invoice(customer_id, &order_id).await?))
}
