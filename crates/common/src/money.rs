//! Fixed-point money amounts.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A money amount held as a decimal with two fractional digits.
///
/// Arithmetic never goes through floating point, so totals computed from
/// unit prices and quantities are exact. Operators assume both sides are
/// stored amounts; line and cart totals use the checked methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "Decimal", into = "Decimal")]
pub struct Money(Decimal);

impl Money {
    /// Number of fractional digits kept on every amount.
    pub const SCALE: u32 = 2;

    /// Largest amount a stored price or order total can hold: 9999999999.99,
    /// the range of a `NUMERIC(12,2)` column.
    pub const MAX: Money = Money(Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, Self::SCALE));

    /// Creates an amount, rounding half away from zero to two decimals.
    pub fn new(amount: Decimal) -> Self {
        Self(round(amount))
    }

    /// Creates an amount from minor units (e.g. 1250 = 12.50).
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, Self::SCALE))
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(Decimal::new(0, Self::SCALE))
    }

    /// Returns the decimal amount.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    /// Whether the amount fits in a stored price or total.
    pub fn is_storable(&self) -> bool {
        !self.is_negative() && *self <= Self::MAX
    }

    /// Multiplies by a quantity, or `None` when the product is larger than
    /// [`Money::MAX`].
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .map(Money::new)
            .filter(|total| *total <= Self::MAX)
    }

    /// Adds two amounts, or `None` when the sum is larger than [`Money::MAX`].
    pub fn checked_add(&self, rhs: Money) -> Option<Money> {
        self.0
            .checked_add(rhs.0)
            .map(Money::new)
            .filter(|total| *total <= Self::MAX)
    }

    /// Returns `percent`% of this amount, rounded to two decimals.
    pub fn percentage(&self, percent: u32) -> Money {
        Money::new(self.0 * Decimal::from(percent) / Decimal::ONE_HUNDRED)
    }
}

fn round(amount: Decimal) -> Decimal {
    let mut rounded =
        amount.round_dp_with_strategy(Money::SCALE, RoundingStrategy::MidpointAwayFromZero);
    // Keep a uniform scale so equal amounts also print identically.
    rounded.rescale(Money::SCALE);
    rounded
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money::new(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money::new(self.0 - rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::SubAssign for Money {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn deserialized_amounts_are_rounded() {
        let money: Money = serde_json::from_str("\"18000\"").unwrap();
        assert_eq!(money.to_string(), "18000.00");
        let money: Money = serde_json::from_str("\"4.125\"").unwrap();
        assert_eq!(serde_json::to_string(&money).unwrap(), "\"4.13\"");
    }

    #[test]
    fn from_cents_keeps_two_decimals() {
        let money = Money::from_cents(1250);
        assert_eq!(money.amount(), dec!(12.50));
        assert_eq!(money.to_string(), "12.50");
    }

    #[test]
    fn new_rounds_half_away_from_zero() {
        assert_eq!(Money::new(dec!(10.005)).amount(), dec!(10.01));
        assert_eq!(Money::new(dec!(10.004)).amount(), dec!(10.00));
        assert_eq!(Money::new(dec!(7)).to_string(), "7.00");
    }

    #[test]
    fn multiply_is_exact() {
        let price = Money::new(dec!(12500.00));
        assert_eq!(price.checked_multiply(2), Some(Money::new(dec!(25000.00))));

        let awkward = Money::new(dec!(0.10));
        assert_eq!(awkward.checked_multiply(3), Some(Money::new(dec!(0.30))));
    }

    #[test]
    fn max_is_the_numeric_12_2_ceiling() {
        assert_eq!(Money::MAX.amount(), dec!(9999999999.99));
        assert_eq!(Money::MAX.to_string(), "9999999999.99");
        assert!(Money::MAX.is_storable());
        assert!(!Money::new(dec!(10000000000.00)).is_storable());
        assert!(!Money::from_cents(-1).is_storable());
    }

    #[test]
    fn checked_arithmetic_stops_at_max() {
        let huge = Money::new(dec!(50000000000000000000000000000));
        assert_eq!(huge.checked_multiply(2), None);
        assert_eq!(Money::MAX.checked_multiply(2), None);
        assert_eq!(Money::MAX.checked_multiply(1), Some(Money::MAX));

        assert_eq!(Money::MAX.checked_add(Money::from_cents(1)), None);
        assert_eq!(
            Money::from_cents(150).checked_add(Money::from_cents(250)),
            Some(Money::from_cents(400))
        );
    }

    #[test]
    fn sum_of_many_small_amounts_does_not_drift() {
        let total: Money = std::iter::repeat_n(Money::new(dec!(0.10)), 1000).sum();
        assert_eq!(total, Money::new(dec!(100.00)));
    }

    #[test]
    fn percentage_rounds_to_cents() {
        let total = Money::new(dec!(333.33));
        assert_eq!(total.percentage(10), Money::new(dec!(33.33)));
        assert_eq!(total.percentage(15), Money::new(dec!(50.00)));
    }

    #[test]
    fn arithmetic_and_sign() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(1500);
        assert_eq!((b - a).to_string(), "5.00");
        assert!((a - b).is_negative());
        assert!(Money::zero().is_zero());

        let mut running = Money::zero();
        running += a;
        running -= Money::from_cents(250);
        assert_eq!(running, Money::from_cents(750));
    }

    #[test]
    fn serializes_as_decimal_string() {
        let json = serde_json::to_string(&Money::new(dec!(25000))).unwrap();
        assert_eq!(json, "\"25000.00\"");
        let back: Money = serde_json::from_str("\"19.99\"").unwrap();
        assert_eq!(back, Money::from_cents(1999));
    }
}
