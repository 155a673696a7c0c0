//! Storefront domain types.
//!
//! Entities carry their own invariants:
//! - `Product` couples stock and availability
//! - `CartItem` never holds zero units and never grows past stock
//! - `StoreSettings` gates fulfillment methods and selects the receipt channel
//! - `Order` and `OrderItem` freeze prices and policy at purchase time

pub mod cart;
pub mod customer;
pub mod error;
pub mod order;
pub mod product;
pub mod promo;
pub mod settings;

pub use cart::{
    Cart, CartItem, CartLine, FulfillmentMethod, LOGISTICS_NOTE_MAX_CHARS, LineChange,
    normalize_logistics_note, total_of,
};
pub use common::{CartId, CartItemId, CustomerId, Money, OrderId, OrderItemId, ProductId};
pub use customer::Customer;
pub use error::DomainError;
pub use order::{DELETED_ITEM_LABEL, Order, OrderItem, OrderNumber};
pub use product::{LOW_STOCK_THRESHOLD, Product, ProductDraft};
pub use promo::PromoCode;
pub use settings::{
    DEFAULT_STORE_NAME, DEFAULT_WHATSAPP_TEMPLATE, ReceiptChannel, SETTINGS_ID, StoreSettings,
};
