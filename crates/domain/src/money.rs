//! Monetary amounts in integer minor units.

use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Money amount represented in minor units (cents) to avoid floating point issues.
///
/// The type is currency-agnostic; the currency travels alongside it where it matters
/// (payment records, gateway requests).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money {
    /// Amount in minor units (e.g., 1000 = 10.00)
    cents: i64,
}

/// Errors produced when converting external amounts into [`Money`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    #[error("invalid amount: {0}")]
    Invalid(String),

    #[error("amount {0} has more precision than the minor unit")]
    TooPrecise(String),

    #[error("amount {0} is out of range")]
    OutOfRange(String),
}

impl Money {
    /// Creates a new Money amount from minor units.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new Money amount from whole major units.
    pub fn from_units(units: i64) -> Self {
        Self { cents: units * 100 }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in minor units.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the whole major-unit portion.
    pub fn units(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the minor-unit remainder after [`Money::units`].
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.cents == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity, failing instead of overflowing.
    pub fn multiply(&self, quantity: u32) -> Result<Money, MoneyError> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
            .ok_or_else(|| MoneyError::OutOfRange(format!("{self} x {quantity}")))
    }

    /// Adds two amounts, failing instead of overflowing.
    pub fn checked_add(self, rhs: Money) -> Result<Money, MoneyError> {
        self.cents
            .checked_add(rhs.cents)
            .map(Money::from_cents)
            .ok_or_else(|| MoneyError::OutOfRange(format!("{self} + {rhs}")))
    }

    /// Sums amounts, failing on the first overflow.
    pub fn try_sum<I>(amounts: I) -> Result<Money, MoneyError>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }

    /// Returns `percent`% of this amount, rounded half-up to the minor unit.
    pub fn percent(&self, percent: u32) -> Money {
        let scaled = self.cents as i128 * percent as i128;
        let rounded = if scaled >= 0 {
            (scaled + 50) / 100
        } else {
            (scaled - 50) / 100
        };
        Money {
            cents: rounded as i64,
        }
    }

    /// Parses a decimal major-unit string such as `"10000.00"`.
    pub fn from_decimal_str(s: &str) -> Result<Money, MoneyError> {
        let value = Decimal::from_str(s.trim()).map_err(|_| MoneyError::Invalid(s.to_string()))?;
        Self::from_decimal(value).map_err(|err| match err {
            MoneyError::Invalid(_) => MoneyError::Invalid(s.to_string()),
            other => other,
        })
    }

    /// Converts a major-unit decimal into minor units.
    pub fn from_decimal(value: Decimal) -> Result<Money, MoneyError> {
        let scaled = value
            .checked_mul(Decimal::ONE_HUNDRED)
            .ok_or_else(|| MoneyError::OutOfRange(value.to_string()))?;
        if !scaled.fract().is_zero() {
            return Err(MoneyError::TooPrecise(value.to_string()));
        }
        scaled
            .to_i64()
            .map(Money::from_cents)
            .ok_or_else(|| MoneyError::OutOfRange(value.to_string()))
    }

    /// Returns the amount as a major-unit decimal.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.cents, 2)
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-{}.{:02}", self.units().abs(), self.cents_part())
        } else {
            write!(f, "{}.{:02}", self.units(), self.cents_part())
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents - rhs.cents,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents += rhs.cents;
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

    #[test]
    fn test_money_from_cents() {
        let money = Money::from_cents(1234);
        assert_eq!(money.cents(), 1234);
        assert_eq!(money.units(), 12);
        assert_eq!(money.cents_part(), 34);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_cents(1234).to_string(), "12.34");
        assert_eq!(Money::from_cents(5).to_string(), "0.05");
        assert_eq!(Money::from_cents(-1234).to_string(), "-12.34");
    }

    #[test]
    fn test_money_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!(a.multiply(3).unwrap().cents(), 3000);

        let mut c = a;
        c += b;
        assert_eq!(c.cents(), 1500);
    }

    #[test]
    fn test_percent_rounds_half_up() {
        assert_eq!(Money::from_units(150_000).percent(30), Money::from_units(45_000));
        // 30% of 0.05 is 0.015, rounds to 0.02
        assert_eq!(Money::from_cents(5).percent(30).cents(), 2);
        // 30% of 0.04 is 0.012, rounds to 0.01
        assert_eq!(Money::from_cents(4).percent(30).cents(), 1);
    }

    #[test]
    fn test_multiply_overflow_is_an_error() {
        let price = Money::from_units(50_000_000);
        assert!(matches!(
            price.multiply(2_000_000_000),
            Err(MoneyError::OutOfRange(_))
        ));
        assert_eq!(
            price.multiply(3).unwrap(),
            Money::from_units(150_000_000)
        );
    }

    #[test]
    fn test_try_sum() {
        let ok = Money::try_sum([Money::from_cents(100), Money::from_cents(250)]).unwrap();
        assert_eq!(ok.cents(), 350);
        assert!(Money::try_sum([Money::from_cents(i64::MAX), Money::from_cents(1)]).is_err());
    }

    #[test]
    fn test_sum() {
        let total: Money = [100, 250, 650].into_iter().map(Money::from_cents).sum();
        assert_eq!(total.cents(), 1000);
    }

    #[test]
    fn test_from_decimal_str() {
        assert_eq!(
            Money::from_decimal_str("10000.00").unwrap(),
            Money::from_units(10_000)
        );
        assert_eq!(Money::from_decimal_str("12.5").unwrap().cents(), 1250);
        assert_eq!(Money::from_decimal_str(" 7 ").unwrap().cents(), 700);
    }

    #[test]
    fn test_from_decimal_str_rejects_bad_input() {
        assert!(matches!(
            Money::from_decimal_str("abc"),
            Err(MoneyError::Invalid(_))
        ));
        assert!(matches!(
            Money::from_decimal_str("1.005"),
            Err(MoneyError::TooPrecise(_))
        ));
    }

    #[test]
    fn test_to_decimal_matches_display() {
        let money = Money::from_cents(45_000_00);
        assert_eq!(money.to_decimal().to_string(), "45000.00");
    }
}
