//! HTTP route handlers and shared state.

pub mod cart;
pub mod checkout;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod owner;

use std::str::FromStr;

use storage::Store;
use storefront::{CartService, CheckoutEngine, OrderArchive, OwnerStudio, ReceiptDispatcher};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub checkout: CheckoutEngine<S>,
    pub carts: CartService<S>,
    pub archive: OrderArchive<S>,
    pub owner: OwnerStudio<S>,
}

impl<S: Store + Clone + 'static> AppState<S> {
    pub fn new(store: S, receipts: ReceiptDispatcher) -> Self {
        Self {
            checkout: CheckoutEngine::new(store.clone(), receipts),
            carts: CartService::new(store.clone()),
            archive: OrderArchive::new(store.clone()),
            owner: OwnerStudio::new(store),
        }
    }
}

/// Parses an identifier from a path segment.
pub(crate) fn parse_id<T: FromStr>(raw: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid ID format: {raw}")))
}
