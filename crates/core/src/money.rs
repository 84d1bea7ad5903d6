use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Neg, Sub};

/// Tolerance in cents used when comparing an amount against a rule's exact-amount guard.
pub const AMOUNT_TOLERANCE_CENTS: i64 = 1;

/// Largest magnitude, in whole currency units, accepted for a single transaction.
pub const MAX_AMOUNT_UNITS: i64 = 1_000_000_000_000;

/// Signed monetary amount. Negative values are expenses, positive values are income or refunds.
/// Arithmetic saturates at the `Decimal` bounds rather than panicking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub fn from_cents(cents: i64) -> Self {
        Money(Decimal::new(cents, 2))
    }

    pub fn from_decimal(decimal: Decimal) -> Self {
        Money(decimal)
    }

    pub fn zero() -> Self {
        Money(Decimal::ZERO)
    }

    pub fn amount(self) -> Decimal {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    pub fn is_expense(self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }

    pub fn is_income(self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    pub fn amount_tolerance() -> Self {
        Money::from_cents(AMOUNT_TOLERANCE_CENTS)
    }

    /// True when `self` and `other` differ by no more than `tolerance`.
    pub fn within(self, other: Money, tolerance: Money) -> bool {
        self.0
            .checked_sub(other.0)
            .is_some_and(|diff| diff.abs() <= tolerance.0)
    }

    /// False for amounts beyond [`MAX_AMOUNT_UNITS`] in either direction.
    pub fn is_plausible(self) -> bool {
        self.0.abs() <= Decimal::from(MAX_AMOUNT_UNITS)
    }

    /// Canonical form with trailing zeros removed, so `5.50` and `5.5` compare and hash alike.
    pub fn normalized(self) -> Self {
        Money(self.0.normalize())
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_sign_negative() && !self.0.is_zero() {
            write!(f, "-${:.2}", self.0.abs())
        } else {
            write!(f, "${:.2}", self.0)
        }
    }
}

impl From<Decimal> for Money {
    fn from(decimal: Decimal) -> Self {
        Money(decimal)
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Money {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Neg for Money {
    type Output = Self;
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |a, b| a + b)
    }
}
