//! Orders: immutable records of completed purchases.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use common::{CustomerId, Money, OrderId, OrderItemId, ProductId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cart::{Cart, FulfillmentMethod};
use crate::error::DomainError;
use crate::product::Product;
use crate::settings::{ReceiptChannel, StoreSettings};

/// Shown in place of an order line whose product is gone and whose name was
/// never captured.
pub const DELETED_ITEM_LABEL: &str = "Deleted item";

/// Customer-facing order number: 12 uppercase hexadecimal characters.
///
/// Uniqueness is enforced by storage, not by the generator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderNumber(String);

impl OrderNumber {
    pub const LENGTH: usize = 12;

    /// Generates a fresh order number from a random UUID.
    pub fn generate() -> Self {
        let token: String = Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(Self::LENGTH)
            .collect();
        Self(token.to_uppercase())
    }

    /// Wraps an order number read from storage or a request path.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into().trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A completed purchase.
///
/// Everything except the completion flag and its payment date is frozen at
/// creation; store policy fields are snapshots, not references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    pub order_id: OrderNumber,
    pub total_paid: Money,
    pub is_completed: bool,
    pub payment_date: Option<DateTime<Utc>>,
    pub fulfillment_method: FulfillmentMethod,
    pub logistics_note: String,
    pub receipt_channel_used: ReceiptChannel,
    pub pre_purchase_instruction_snapshot: String,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Materializes a paid order from a cart and the settings in force.
    pub fn paid(
        cart: &Cart,
        settings: &StoreSettings,
        total_paid: Money,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::new(),
            customer_id: cart.customer_id,
            order_id: OrderNumber::generate(),
            total_paid,
            is_completed: true,
            payment_date: Some(now),
            fulfillment_method: cart.fulfillment_method,
            logistics_note: cart.logistics_note.clone(),
            receipt_channel_used: settings.receipt_channel,
            pre_purchase_instruction_snapshot: settings.pre_purchase_instruction.clone(),
            created_at: now,
        }
    }

    /// Owner completion toggle. Completing stamps a fresh payment date.
    pub fn toggle_completion(&mut self, now: DateTime<Utc>) {
        self.is_completed = !self.is_completed;
        if self.is_completed {
            self.payment_date = Some(now);
        }
    }
}

/// One line of an order, with the unit price captured at purchase time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    /// Cleared when the product is later deleted.
    pub product_id: Option<ProductId>,
    /// Product name at purchase time.
    pub product_name: String,
    pub price: Money,
    pub quantity: u32,
}

impl OrderItem {
    /// Captures `quantity` units of `product` at its current price.
    pub fn capture(order_id: OrderId, product: &Product, quantity: u32) -> Result<Self, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }
        Ok(Self {
            id: OrderItemId::new(),
            order_id,
            product_id: Some(product.id),
            product_name: product.name.clone(),
            price: product.price,
            quantity,
        })
    }

    pub fn line_total(&self) -> Result<Money, DomainError> {
        self.price
            .checked_multiply(self.quantity)
            .ok_or(DomainError::AmountTooLarge)
    }

    pub fn is_product_deleted(&self) -> bool {
        self.product_id.is_none()
    }

    /// Name to render on history and invoices.
    pub fn display_name(&self) -> Cow<'_, str> {
        match (self.product_id, self.product_name.is_empty()) {
            (_, true) => Cow::Borrowed(DELETED_ITEM_LABEL),
            (Some(_), false) => Cow::Borrowed(&self.product_name),
            (None, false) => Cow::Owned(format!("{} (no longer listed)", self.product_name)),
        }
    }
}
