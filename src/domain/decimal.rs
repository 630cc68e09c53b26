//! Money and rate arithmetic on top of rust_decimal.
//!
//! Values are stored as canonical strings, travel as JSON numbers, and are
//! rounded only once: when a money amount is persisted.

use rust_decimal::{Decimal as RustDecimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Number of decimal places kept for persisted money amounts.
pub const MONEY_SCALE: u32 = 2;

/// Exact decimal used for every quantity, price, rate and amount.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::float")] RustDecimal);

impl Decimal {
    /// # Errors
    /// Fails on anything that is not a plain or scientific decimal literal.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        s.trim().parse::<RustDecimal>().map(Decimal)
    }

    /// Trailing zeros stripped, never exponent notation. This is the storage form.
    pub fn to_canonical_string(&self) -> String {
        self.0.normalize().to_string()
    }

    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    pub fn one() -> Self {
        Decimal(RustDecimal::ONE)
    }

    pub fn hundred() -> Self {
        Decimal(RustDecimal::ONE_HUNDRED)
    }

    pub fn from_i64(value: i64) -> Self {
        Decimal(value.into())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > RustDecimal::ZERO
    }

    /// Strictly less than zero.
    pub fn is_negative(&self) -> bool {
        self.0 < RustDecimal::ZERO
    }

    /// `None` on a zero divisor or overflow.
    pub fn checked_div(&self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_div(rhs.0).map(Decimal)
    }

    /// Growth factor for a percentage: `1 + pct / 100`.
    pub fn percent_factor(&self) -> Decimal {
        Decimal(RustDecimal::ONE + self.0 / RustDecimal::ONE_HUNDRED)
    }

    /// Percentage change represented by a growth factor: `(factor - 1) * 100`.
    pub fn factor_to_percent(&self) -> Decimal {
        Decimal((self.0 - RustDecimal::ONE) * RustDecimal::ONE_HUNDRED)
    }

    /// Round to the cent, midpoint away from zero.
    pub fn round_money(&self) -> Decimal {
        Decimal(
            self.0
                .round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero),
        )
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str_canonical(s)
    }
}

macro_rules! binary_op {
    ($trait:ident, $method:ident, $assign_trait:ident, $assign_method:ident, $op:tt) => {
        impl $trait for Decimal {
            type Output = Decimal;

            fn $method(self, rhs: Decimal) -> Decimal {
                Decimal(self.0 $op rhs.0)
            }
        }

        impl $assign_trait for Decimal {
            fn $assign_method(&mut self, rhs: Decimal) {
                *self = *self $op rhs;
            }
        }
    };
}

binary_op!(Add, add, AddAssign, add_assign, +);
binary_op!(Sub, sub, SubAssign, sub_assign, -);
binary_op!(Mul, mul, MulAssign, mul_assign, *);

// Division panics on a zero divisor like the primitive types; use
// `checked_div` where the divisor comes from data.
impl Div for Decimal {
    type Output = Decimal;

    fn div(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 / rhs.0)
    }
}

impl Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

impl Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Self {
        iter.fold(Decimal::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Decimal> for Decimal {
    fn sum<I: Iterator<Item = &'a Decimal>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_storage_form_strips_trailing_zeros() {
        assert_eq!(d("1000.00").to_canonical_string(), "1000");
        assert_eq!(d("0.50").to_canonical_string(), "0.5");
        assert_eq!(d(" 12 ").to_canonical_string(), "12");
    }

    #[test]
    fn test_wire_form_is_a_json_number() {
        let json = serde_json::to_value(d("1010.25")).unwrap();
        assert!(json.is_number());
        assert_eq!(json.to_string(), "1010.25");
    }

    #[test]
    fn test_round_money_midpoint_away_from_zero() {
        assert_eq!(d("10.005").round_money(), d("10.01"));
        assert_eq!(d("-10.005").round_money(), d("-10.01"));
        assert_eq!(d("10.004").round_money(), d("10"));
    }

    #[test]
    fn test_percent_factor_roundtrip() {
        assert_eq!(d("2").percent_factor(), d("1.02"));
        assert_eq!(d("1.061106").factor_to_percent(), d("6.1106"));
    }

    #[test]
    fn test_sign_checks_treat_zero_as_neither() {
        assert!(!Decimal::zero().is_positive());
        assert!(!Decimal::zero().is_negative());
        assert!(d("-0.01").is_negative());
    }

    #[test]
    fn test_checked_div_by_zero() {
        assert_eq!(d("1").checked_div(Decimal::zero()), None);
        assert_eq!(d("10").checked_div(d("4")), Some(d("2.5")));
    }

    #[test]
    fn test_assign_ops_and_sum() {
        let mut residual = d("1000");
        residual -= d("250.5");
        residual += d("0.5");
        assert_eq!(residual, d("750"));

        let values = vec![d("1.5"), d("2.5"), d("-1")];
        let total: Decimal = values.iter().sum();
        assert_eq!(total, d("3"));
    }
}
