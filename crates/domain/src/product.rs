//! Catalog products and the stock/availability invariant.

use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Products at or below this stock level count as low stock on the owner dashboard.
pub const LOW_STOCK_THRESHOLD: u32 = 2;

/// A catalog product.
///
/// Stock and availability are coupled: a product with zero units is never
/// available. The stock fields are private so every mutation goes through a
/// method that keeps that invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    /// Slashed "was" price shown next to the selling price.
    pub original_price: Option<Money>,
    quantity: u32,
    is_available: bool,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Creates a product. It is available as long as it has stock.
    pub fn new(name: impl Into<String>, price: Money, quantity: u32) -> Result<Self, DomainError> {
        let name = name.into();
        validate_name(&name)?;
        validate_price(price)?;
        Ok(Self {
            id: ProductId::new(),
            name,
            description: String::new(),
            price,
            original_price: None,
            quantity,
            is_available: quantity > 0,
            created_at: Utc::now(),
        })
    }

    /// Creates a product from an owner-submitted draft.
    pub fn from_draft(draft: ProductDraft) -> Result<Self, DomainError> {
        let mut product = Self::new(draft.name.clone(), draft.price, draft.quantity)?;
        product.apply_draft(draft)?;
        Ok(product)
    }

    /// Restores the persisted stock fields.
    ///
    /// A stored row that claims availability with zero stock still reads
    /// as unavailable.
    pub fn with_stock_state(mut self, quantity: u32, is_available: bool) -> Self {
        self.quantity = quantity;
        self.is_available = is_available && quantity > 0;
        self
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn is_available(&self) -> bool {
        self.is_available
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.quantity == 0
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= LOW_STOCK_THRESHOLD
    }

    /// True when a slashed price higher than the selling price is set.
    pub fn on_sale(&self) -> bool {
        self.original_price.is_some_and(|original| original > self.price)
    }

    /// True when `requested` units can be sold right now.
    pub fn can_supply(&self, requested: u32) -> bool {
        self.is_available && self.quantity >= requested
    }

    /// Sets the stock level. Reaching zero switches availability off; a
    /// restock does not switch it back on by itself.
    pub fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
        if quantity == 0 {
            self.is_available = false;
        }
    }

    /// Owner availability switch. Has no effect on a product without stock.
    pub fn set_available(&mut self, available: bool) {
        self.is_available = available && self.quantity > 0;
    }

    pub fn set_price(&mut self, price: Money) -> Result<(), DomainError> {
        validate_price(price)?;
        self.price = price;
        Ok(())
    }

    /// Takes `requested` units out of stock for a purchase.
    pub fn reserve(&mut self, requested: u32) -> Result<(), DomainError> {
        if !self.can_supply(requested) {
            return Err(DomainError::StockUnderflow {
                product_id: self.id,
                requested,
                available: self.quantity,
            });
        }
        self.quantity -= requested;
        self.is_available = self.quantity > 0;
        Ok(())
    }

    /// Replaces the editable fields with an owner draft.
    pub fn apply_draft(&mut self, draft: ProductDraft) -> Result<(), DomainError> {
        validate_name(&draft.name)?;
        validate_price(draft.price)?;
        if let Some(original) = draft.original_price {
            validate_price(original)?;
        }
        self.name = draft.name;
        self.description = draft.description;
        self.price = draft.price;
        self.original_price = draft.original_price;
        self.quantity = draft.quantity;
        self.set_available(draft.is_available);
        Ok(())
    }
}

/// Owner-editable product fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    #[serde(default)]
    pub original_price: Option<Money>,
    pub quantity: u32,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

fn validate_name(name: &str) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::ProductNameRequired);
    }
    Ok(())
}

fn validate_price(price: Money) -> Result<(), DomainError> {
    if !price.is_storable() {
        return Err(DomainError::InvalidPrice {
            price: price.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn dress(quantity: u32) -> Product {
        Product::new("Vintage Dress", Money::new(dec!(12500.00)), quantity).unwrap()
    }

    #[test]
    fn new_product_is_available_only_with_stock() {
        assert!(dress(2).is_available());
        assert!(!dress(0).is_available());
    }

    #[test]
    fn reaching_zero_stock_disables_availability() {
        let mut product = dress(2);
        product.set_quantity(0);
        assert!(!product.is_available());
        assert!(product.is_out_of_stock());
    }

    #[test]
    fn restock_does_not_reenable_by_itself() {
        let mut product = dress(0);
        product.set_quantity(4);
        assert!(!product.is_available());
        product.set_available(true);
        assert!(product.is_available());
    }

    #[test]
    fn cannot_enable_without_stock() {
        let mut product = dress(0);
        product.set_available(true);
        assert!(!product.is_available());
    }

    #[test]
    fn reserve_decrements_and_recomputes_availability() {
        let mut product = dress(3);
        product.reserve(2).unwrap();
        assert_eq!(product.quantity(), 1);
        assert!(product.is_available());

        product.reserve(1).unwrap();
        assert_eq!(product.quantity(), 0);
        assert!(!product.is_available());
    }

    #[test]
    fn reserve_rejects_more_than_stock() {
        let mut product = dress(1);
        let err = product.reserve(2).unwrap_err();
        assert!(matches!(
            err,
            DomainError::StockUnderflow {
                requested: 2,
                available: 1,
                ..
            }
        ));
        assert_eq!(product.quantity(), 1);
    }

    #[test]
    fn reserve_rejects_unavailable_product() {
        let mut product = dress(5);
        product.set_available(false);
        assert!(product.reserve(1).is_err());
        assert_eq!(product.quantity(), 5);
    }

    #[test]
    fn persisted_state_keeps_invariant() {
        let product = dress(3).with_stock_state(0, true);
        assert!(!product.is_available());
    }

    #[test]
    fn negative_price_is_rejected() {
        assert!(Product::new("Hat", Money::new(dec!(-1)), 1).is_err());
        let mut product = dress(1);
        assert!(product.set_price(Money::new(dec!(-0.01))).is_err());
    }

    #[test]
    fn price_above_storable_range_is_rejected() {
        let result = Product::new("Hat", Money::new(dec!(50000000000000000000000000000)), 3);
        assert!(matches!(result, Err(DomainError::InvalidPrice { .. })));

        let mut product = dress(1);
        assert!(product.set_price(Money::new(dec!(10000000000))).is_err());
        assert!(product.set_price(Money::MAX).is_ok());
    }

    #[test]
    fn on_sale_compares_original_price() {
        let mut product = dress(1);
        assert!(!product.on_sale());
        product.original_price = Some(Money::new(dec!(15000)));
        assert!(product.on_sale());
    }

    #[test]
    fn draft_applies_fields() {
        let draft = ProductDraft {
            name: "Silk Scarf".to_string(),
            description: "Hand rolled edges".to_string(),
            price: Money::new(dec!(4500)),
            original_price: None,
            quantity: 0,
            is_available: true,
        };
        let product = Product::from_draft(draft).unwrap();
        assert_eq!(product.name, "Silk Scarf");
        assert!(!product.is_available());
    }
}
