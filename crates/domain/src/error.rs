//! Domain error types.

use common::{Money, ProductId};
use thiserror::Error;

/// Errors raised when a value would break an entity invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A cart or order line must hold at least one unit.
    #[error("Invalid quantity: {quantity} (must be at least 1)")]
    InvalidQuantity { quantity: u32 },

    /// Prices are never negative and never above `Money::MAX`.
    #[error("Invalid price: {price} (must be between 0.00 and {})", Money::MAX)]
    InvalidPrice { price: String },

    /// A line or cart total is larger than `Money::MAX`.
    #[error("Total is too large: the most a single order can hold is {}", Money::MAX)]
    AmountTooLarge,

    /// Removing more units than are in stock.
    #[error("Stock underflow for product {product_id}: {requested} requested, {available} available")]
    StockUnderflow {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    /// Unrecognised fulfillment method code.
    #[error("Unknown fulfillment method: {0}")]
    UnknownFulfillmentMethod(String),

    /// Unrecognised receipt channel code.
    #[error("Unknown receipt channel: {0}")]
    UnknownReceiptChannel(String),

    /// Logistics note exceeds the stored column width.
    #[error("Logistics note is too long: {length} characters (max {max})")]
    LogisticsNoteTooLong { length: usize, max: usize },

    /// Discount percentage outside 0..=100.
    #[error("Invalid discount percentage: {0}")]
    InvalidDiscount(u32),

    /// Product names cannot be blank.
    #[error("Product name is required")]
    ProductNameRequired,
}
