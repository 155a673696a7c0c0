//! Owner studio endpoints.
//!
//! Owner authentication happens upstream; these routes trust the gateway.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{OrderId, ProductId};
use domain::{Order, Product, ProductDraft, StoreSettings};
use serde::Deserialize;
use storage::Store;
use storefront::{DashboardSummary, QuickEdit};

use super::{AppState, parse_id};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct RestockRequest {
    pub quantity: u32,
}

/// GET /owner/dashboard
#[tracing::instrument(skip(state))]
pub async fn dashboard<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<DashboardSummary>, ApiError> {
    Ok(Json(state.owner.dashboard(chrono::Utc::now()).await?))
}

/// GET /owner/settings
pub async fn get_settings<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Json<StoreSettings> {
    Json(state.owner.settings().await)
}

/// PUT /owner/settings
#[tracing::instrument(skip(state, settings))]
pub async fn update_settings<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(settings): Json<StoreSettings>,
) -> Result<Json<StoreSettings>, ApiError> {
    Ok(Json(state.owner.update_settings(&settings).await?))
}

/// GET /owner/products
pub async fn list_products<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Product>>, ApiError> {
    Ok(Json(state.owner.list_products().await?))
}

/// POST /owner/products
#[tracing::instrument(skip(state, draft))]
pub async fn create_product<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(draft): Json<ProductDraft>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    let product = state.owner.create_product(draft).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /owner/products/{id}
#[tracing::instrument(skip(state, draft))]
pub async fn edit_product<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(draft): Json<ProductDraft>,
) -> Result<Json<Product>, ApiError> {
    let id: ProductId = parse_id(&id)?;
    Ok(Json(state.owner.edit_product(id, draft).await?))
}

/// PATCH /owner/products/{id}
#[tracing::instrument(skip(state))]
pub async fn quick_edit<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(edit): Json<QuickEdit>,
) -> Result<Json<Product>, ApiError> {
    let id: ProductId = parse_id(&id)?;
    Ok(Json(state.owner.quick_edit(id, edit).await?))
}

/// POST /owner/products/{id}/toggle
#[tracing::instrument(skip(state))]
pub async fn toggle_product<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Product>, ApiError> {
    let id: ProductId = parse_id(&id)?;
    Ok(Json(state.owner.toggle_availability(id).await?))
}

/// POST /owner/products/{id}/restock
#[tracing::instrument(skip(state))]
pub async fn restock<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<RestockRequest>,
) -> Result<Json<Product>, ApiError> {
    let id: ProductId = parse_id(&id)?;
    Ok(Json(state.owner.restock(id, req.quantity).await?))
}

/// DELETE /owner/products/{id}
#[tracing::instrument(skip(state))]
pub async fn delete_product<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: ProductId = parse_id(&id)?;
    state.owner.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /owner/orders/{id}/toggle
#[tracing::instrument(skip(state))]
pub async fn toggle_order<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let id: OrderId = parse_id(&id)?;
    Ok(Json(state.owner.toggle_order_status(id).await?))
}
