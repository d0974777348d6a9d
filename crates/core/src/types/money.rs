//! Decimal money amounts normalized to two decimal places.
//!
//! Cart arithmetic is computed server-side; this type exists so client-side
//! reconciliation (invariant checks, fee resets) never touches floating
//! point and always compares at two-decimal precision.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Sub};
use core::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Money`] amount.
#[derive(thiserror::Error, Debug, Clone)]
pub enum MoneyError {
    /// The input string is not a decimal number.
    #[error("invalid money amount: {0}")]
    Invalid(String),
    /// The amount is negative where a non-negative amount is required.
    #[error("money amount cannot be negative: {0}")]
    Negative(Decimal),
}

/// A monetary amount in the shop currency, held at two-decimal precision.
///
/// Construction always rounds to two decimal places, so equality between two
/// `Money` values is equality to the cent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// The zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount from a decimal value, rounding to two places.
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        Self(amount.round_dp(2))
    }

    /// Create an amount from a whole number of cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// Get the underlying decimal value.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether this amount is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Subtract, flooring the result at zero.
    ///
    /// Discounts reduce a total but must never drive it negative.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        let result = self.0 - other.0;
        if result.is_sign_negative() {
            Self::ZERO
        } else {
            Self(result)
        }
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl FromStr for Money {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let amount =
            Decimal::from_str(s.trim()).map_err(|_| MoneyError::Invalid(s.to_string()))?;
        Ok(Self::new(amount))
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounds_to_two_places() {
        let m: Money = "19.999".parse().unwrap();
        assert_eq!(m, Money::from_cents(2000));
        assert_eq!(m.to_string(), "20.00");
    }

    #[test]
    fn test_saturating_sub_floors_at_zero() {
        let total = Money::from_cents(500);
        let discount = Money::from_cents(800);
        assert_eq!(total.saturating_sub(discount), Money::ZERO);
        assert_eq!(discount.saturating_sub(total), Money::from_cents(300));
    }

    #[test]
    fn test_sum_of_line_totals() {
        let lines = [Money::from_cents(1050), Money::from_cents(2500)];
        let sum: Money = lines.into_iter().sum();
        assert_eq!(sum, Money::from_cents(3550));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("12,50".parse::<Money>().is_err());
        assert!("".parse::<Money>().is_err());
    }

    #[test]
    fn test_display_pads_cents() {
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::ZERO.to_string(), "0.00");
    }
}
