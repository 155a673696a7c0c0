//! Cart endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::{CartItemId, ProductId};
use domain::{Cart, FulfillmentMethod};
use serde::Deserialize;
use storage::Store;
use storefront::{CartOutcome, CartView};

use super::{AppState, parse_id};
use crate::error::ApiError;
use crate::extract::CurrentCustomer;

#[derive(Debug, Deserialize)]
pub struct CartQuery {
    pub coupon: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FulfillmentRequest {
    pub method: FulfillmentMethod,
    #[serde(default)]
    pub logistics_note: String,
}

/// GET /cart?coupon=
#[tracing::instrument(skip(state))]
pub async fn view<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer_id): CurrentCustomer,
    Query(query): Query<CartQuery>,
) -> Result<Json<CartView>, ApiError> {
    let view = state
        .carts
        .view(customer_id, query.coupon.as_deref())
        .await?;
    Ok(Json(view))
}

/// POST /cart/items/{product_id}
#[tracing::instrument(skip(state))]
pub async fn add<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer_id): CurrentCustomer,
    Path(id): Path<String>,
) -> Result<Json<CartOutcome>, ApiError> {
    let product_id: ProductId = parse_id(&id)?;
    Ok(Json(state.carts.add(customer_id, product_id).await?))
}

/// POST /cart/items/{item_id}/increment
#[tracing::instrument(skip(state))]
pub async fn increment<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer_id): CurrentCustomer,
    Path(id): Path<String>,
) -> Result<Json<CartOutcome>, ApiError> {
    let item_id: CartItemId = parse_id(&id)?;
    Ok(Json(state.carts.increment(customer_id, item_id).await?))
}

/// POST /cart/items/{item_id}/decrement
#[tracing::instrument(skip(state))]
pub async fn decrement<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer_id): CurrentCustomer,
    Path(id): Path<String>,
) -> Result<Json<CartOutcome>, ApiError> {
    let item_id: CartItemId = parse_id(&id)?;
    Ok(Json(state.carts.decrement(customer_id, item_id).await?))
}

/// DELETE /cart/items/{item_id}
#[tracing::instrument(skip(state))]
pub async fn remove<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer_id): CurrentCustomer,
    Path(id): Path<String>,
) -> Result<Json<CartOutcome>, ApiError> {
    let item_id: CartItemId = parse_id(&id)?;
    Ok(Json(state.carts.remove(customer_id, item_id).await?))
}

/// PUT /cart/fulfillment
#[tracing::instrument(skip(state, req))]
pub async fn choose_fulfillment<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    CurrentCustomer(customer_id): CurrentCustomer,
    Json(req): Json<FulfillmentRequest>,
) -> Result<Json<Cart>, ApiError> {
    let cart = state
        .carts
        .choose_fulfillment(customer_id, req.method, &req.logistics_note)
        .await?;
    Ok(Json(cart))
}
