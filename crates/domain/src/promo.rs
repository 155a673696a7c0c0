//! Percentage promo codes quoted on the cart page.

use common::Money;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A promo code granting a percentage off the cart total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromoCode {
    pub code: String,
    pub discount_percentage: u32,
    pub is_active: bool,
}

impl PromoCode {
    pub fn new(code: impl Into<String>, discount_percentage: u32) -> Result<Self, DomainError> {
        if discount_percentage > 100 {
            return Err(DomainError::InvalidDiscount(discount_percentage));
        }
        Ok(Self {
            code: code.into().trim().to_string(),
            discount_percentage,
            is_active: true,
        })
    }

    /// Case-insensitive code comparison.
    pub fn matches(&self, code: &str) -> bool {
        self.code.eq_ignore_ascii_case(code.trim())
    }

    /// Discount on `total`, rounded to cents and never above the total.
    pub fn discount_for(&self, total: Money) -> Money {
        total.percentage(self.discount_percentage.min(100))
    }
}
