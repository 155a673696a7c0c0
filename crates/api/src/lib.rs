//! HTTP API server for the storefront.
//!
//! Thin axum handlers over the storefront services, with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};
use metrics_exporter_prometheus::PrometheusHandle;
use storage::Store;
use storefront::{LogMailer, ReceiptDispatcher};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart", get(routes::cart::view::<S>))
        .route("/cart/fulfillment", put(routes::cart::choose_fulfillment::<S>))
        .route(
            "/cart/items/{id}",
            post(routes::cart::add::<S>).delete(routes::cart::remove::<S>),
        )
        .route(
            "/cart/items/{id}/increment",
            post(routes::cart::increment::<S>),
        )
        .route(
            "/cart/items/{id}/decrement",
            post(routes::cart::decrement::<S>),
        )
        .route("/checkout", post(routes::checkout::complete::<S>))
        .route("/orders", get(routes::orders::history::<S>))
        .route("/orders/{order_id}", get(routes::orders::invoice::<S>))
        .route("/owner/dashboard", get(routes::owner::dashboard::<S>))
        .route(
            "/owner/settings",
            get(routes::owner::get_settings::<S>).put(routes::owner::update_settings::<S>),
        )
        .route(
            "/owner/products",
            get(routes::owner::list_products::<S>).post(routes::owner::create_product::<S>),
        )
        .route(
            "/owner/products/{id}",
            put(routes::owner::edit_product::<S>)
                .patch(routes::owner::quick_edit::<S>)
                .delete(routes::owner::delete_product::<S>),
        )
        .route(
            "/owner/products/{id}/toggle",
            post(routes::owner::toggle_product::<S>),
        )
        .route(
            "/owner/products/{id}/restock",
            post(routes::owner::restock::<S>),
        )
        .route(
            "/owner/orders/{id}/toggle",
            post(routes::owner::toggle_order::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the default application state: receipts go through the log
/// mailer.
pub fn create_default_state<S: Store + Clone + 'static>(
    store: S,
    receipt_from_address: &str,
) -> Arc<AppState<S>> {
    let receipts = ReceiptDispatcher::new(LogMailer::new(receipt_from_address));
    Arc::new(AppState::new(store, receipts))
}
