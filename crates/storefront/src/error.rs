//! Storefront error types.

use common::{CustomerId, ProductId};
use domain::{DomainError, FulfillmentMethod};
use storage::StorageError;
use thiserror::Error;

/// Reasons a checkout is refused.
///
/// The first three variants are customer-correctable; none of them leave
/// anything written.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The cart is missing or has no lines.
    #[error("Your bag is empty.")]
    EmptyCart,

    /// A product can no longer cover its cart line.
    #[error("{product_name} no longer has enough stock. Please update your bag.")]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
    },

    /// The cart's fulfillment method was switched off by the owner.
    #[error("{} is currently unavailable. Please choose another logistics option.", method.label())]
    FulfillmentUnavailable { method: FulfillmentMethod },

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl CheckoutError {
    /// Short label used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            CheckoutError::EmptyCart => "empty_cart",
            CheckoutError::InsufficientStock { .. } => "insufficient_stock",
            CheckoutError::FulfillmentUnavailable { .. } => "fulfillment_unavailable",
            CheckoutError::Domain(_) => "domain",
            CheckoutError::Storage(_) => "storage",
        }
    }
}

/// Errors from cart, archive and owner operations.
#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Product not found.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The product cannot be added to a cart right now.
    #[error("{name} is currently out of stock.")]
    OutOfStock { product_id: ProductId, name: String },

    /// Order not found, or not owned by the caller.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// The chosen fulfillment method is switched off.
    #[error("{} is currently disabled by the store owner.", method.label())]
    FulfillmentUnavailable { method: FulfillmentMethod },

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Receipt delivery failures. Logged and counted, never returned by checkout.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// No account is on file for the order's customer.
    #[error("Customer not found: {0}")]
    CustomerNotFound(CustomerId),

    /// The customer has no address for this channel.
    #[error("Customer {0} has no email address")]
    MissingAddress(CustomerId),

    /// The outbound transport refused the message.
    #[error("Mail transport error: {0}")]
    Transport(String),

    /// The order could not be rendered.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Convenience type alias for storefront results.
pub type Result<T> = std::result::Result<T, StorefrontError>;
