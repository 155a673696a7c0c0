//! Customer carts and their lines.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use common::{CartId, CartItemId, CustomerId, Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::product::Product;

/// Longest logistics note a cart or order can carry.
pub const LOGISTICS_NOTE_MAX_CHARS: usize = 255;

/// How an order physically reaches the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentMethod {
    #[default]
    Pickup,
    /// Third-party waybill delivery.
    Waybill,
}

impl FulfillmentMethod {
    pub const ALL: [FulfillmentMethod; 2] = [FulfillmentMethod::Pickup, FulfillmentMethod::Waybill];

    /// Stored code.
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentMethod::Pickup => "PICKUP",
            FulfillmentMethod::Waybill => "WAYBILL",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            FulfillmentMethod::Pickup => "Pickup",
            FulfillmentMethod::Waybill => "Waybill delivery",
        }
    }
}

impl std::fmt::Display for FulfillmentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FulfillmentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FulfillmentMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| DomainError::UnknownFulfillmentMethod(s.to_string()))
    }
}

/// Trims a logistics note and checks it fits the stored width.
pub fn normalize_logistics_note(note: &str) -> Result<String, DomainError> {
    let note = note.trim();
    let length = note.chars().count();
    if length > LOGISTICS_NOTE_MAX_CHARS {
        return Err(DomainError::LogisticsNoteTooLong {
            length,
            max: LOGISTICS_NOTE_MAX_CHARS,
        });
    }
    Ok(note.to_string())
}

/// A customer's cart. Exactly one per customer; it outlives checkouts and
/// only its lines are cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub customer_id: CustomerId,
    pub fulfillment_method: FulfillmentMethod,
    pub logistics_note: String,
    pub created_at: DateTime<Utc>,
}

impl Cart {
    /// Creates an empty cart set to pickup.
    pub fn new(customer_id: CustomerId) -> Self {
        Self {
            id: CartId::new(),
            customer_id,
            fulfillment_method: FulfillmentMethod::default(),
            logistics_note: String::new(),
            created_at: Utc::now(),
        }
    }

    /// Records the customer's fulfillment choice.
    ///
    /// Whether the method is currently allowed is a store policy question
    /// and is checked by the caller.
    pub fn set_logistics(
        &mut self,
        method: FulfillmentMethod,
        note: &str,
    ) -> Result<(), DomainError> {
        self.logistics_note = normalize_logistics_note(note)?;
        self.fulfillment_method = method;
        Ok(())
    }
}

/// What a cart line mutation should do to the stored row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineChange {
    /// Store the new quantity.
    Set(u32),
    /// Delete the line; a zero-quantity line is never stored.
    Delete,
    /// Leave the line alone: the stock ceiling was reached.
    StockLimit { available: u32 },
}

/// One product line of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    quantity: u32,
}

impl CartItem {
    /// Creates a line holding a single unit.
    pub fn new(cart_id: CartId, product_id: ProductId) -> Self {
        Self {
            id: CartItemId::new(),
            cart_id,
            product_id,
            quantity: 1,
        }
    }

    /// Sets the quantity of a line, rejecting zero.
    pub fn with_quantity(mut self, quantity: u32) -> Result<Self, DomainError> {
        if quantity == 0 {
            return Err(DomainError::InvalidQuantity { quantity });
        }
        self.quantity = quantity;
        Ok(self)
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    /// One more unit, as long as the product's current stock allows it.
    pub fn increment(&self, product: &Product) -> LineChange {
        if self.quantity < product.quantity() {
            LineChange::Set(self.quantity + 1)
        } else {
            LineChange::StockLimit {
                available: product.quantity(),
            }
        }
    }

    /// One unit fewer; the last unit removes the line.
    pub fn decrement(&self) -> LineChange {
        if self.quantity > 1 {
            LineChange::Set(self.quantity - 1)
        } else {
            LineChange::Delete
        }
    }
}

/// A cart line joined with its current product row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub item: CartItem,
    pub product: Product,
}

impl CartLine {
    /// Line total at the product's current price.
    pub fn line_total(&self) -> Result<Money, DomainError> {
        self.product
            .price
            .checked_multiply(self.item.quantity())
            .ok_or(DomainError::AmountTooLarge)
    }
}

/// Sums line totals, refusing a total larger than `Money::MAX`.
pub fn total_of(totals: impl IntoIterator<Item = Money>) -> Result<Money, DomainError> {
    totals.into_iter().try_fold(Money::zero(), |total, line| {
        total.checked_add(line).ok_or(DomainError::AmountTooLarge)
    })
}
