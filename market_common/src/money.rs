use std::{fmt::Display, iter::Sum, ops::Mul};

use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const CENTS_PER_UNIT: i64 = 100;

//--------------------------------------       Money         ---------------------------------------------------------
/// A monetary amount, held as a whole number of cents.
///
/// Amounts are currency-agnostic. Storage and arithmetic happen on the integer value so that no rounding ever happens
/// at rest. Percentage maths converts to [`Decimal`] via [`Money::to_decimal`] and back with [`Money::try_from`],
/// which rounds half away from zero to the nearest cent.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct Money(i64);

op!(binary Money, Add, add);
op!(binary Money, Sub, sub);
op!(inplace Money, AddAssign, add_assign);
op!(inplace Money, SubAssign, sub_assign);
op!(unary Money, Neg, neg);

impl Mul<i64> for Money {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), |acc, v| acc + v)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented as a money amount: {0}")]
pub struct MoneyConversionError(String);

impl From<i64> for Money {
    fn from(cents: i64) -> Self {
        Self(cents)
    }
}

impl TryFrom<Decimal> for Money {
    type Error = MoneyConversionError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        let cents = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero) * Decimal::ONE_HUNDRED;
        cents.to_i64().map(Self).ok_or_else(|| MoneyConversionError(format!("{value} is out of range")))
    }
}

impl Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub fn from_units(units: i64) -> Self {
        Self(units * CENTS_PER_UNIT)
    }

    /// The amount in cents
    pub fn value(&self) -> i64 {
        self.0
    }

    /// The amount in whole currency units, with exactly two decimal places.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, 2)
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn abs(&self) -> Self {
        Self(self.0.abs())
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn display() {
        assert_eq!(Money::from(4500).to_string(), "45.00");
        assert_eq!(Money::from(5).to_string(), "0.05");
        assert_eq!(Money::from(-1250).to_string(), "-12.50");
    }

    #[test]
    fn decimal_conversion_rounds_half_away_from_zero() {
        assert_eq!(Money::try_from(dec!(2.255)).unwrap(), Money::from(226));
        assert_eq!(Money::try_from(dec!(2.254)).unwrap(), Money::from(225));
        assert_eq!(Money::try_from(dec!(-2.255)).unwrap(), Money::from(-226));
        assert_eq!(Money::from_units(35).to_decimal(), dec!(35.00));
    }

    #[test]
    fn arithmetic() {
        let mut total: Money = [100, 250, -50].into_iter().map(Money::from).sum();
        assert_eq!(total, Money::from(300));
        total -= Money::from(100);
        total += Money::from_units(1);
        assert_eq!(total, Money::from(300));
        assert_eq!(-total, Money::from(-300));
        assert_eq!(total * 3, Money::from(900));
        assert!(Money::from(-1).abs().is_positive());
    }

    #[test]
    fn serializes_as_cents() {
        let json = serde_json::to_string(&Money::from(1999)).unwrap();
        assert_eq!(json, "1999");
    }
}
