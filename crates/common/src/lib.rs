//! Shared types for the storefront crates.

mod money;
mod types;

pub use money::Money;
pub use types::{CartId, CartItemId, CustomerId, OrderId, OrderItemId, ProductId};
