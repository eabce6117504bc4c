use crate::error::{LendingError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// A monetary value, kept as a fixed-point decimal so fines never pick up
/// floating-point drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Money::ZERO, Add::add)
    }
}

/// Fine charged per started day of lateness, between zero and
/// [`DailyRate::MAX`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct DailyRate(Decimal);

impl DailyRate {
    pub const MAX: Decimal = dec!(1000000);

    pub fn new(value: Decimal) -> Result<Self> {
        if value < Decimal::ZERO {
            return Err(LendingError::InvalidConfig(format!(
                "daily fine rate must not be negative, got {}",
                value
            )));
        }
        if value > Self::MAX {
            return Err(LendingError::InvalidConfig(format!(
                "daily fine rate must not exceed {}, got {}",
                Self::MAX,
                value
            )));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Fine for `days` started days of lateness. Saturates instead of
    /// overflowing.
    pub fn for_days(&self, days: i64) -> Money {
        if days <= 0 {
            return Money::ZERO;
        }
        let fine = self
            .0
            .checked_mul(Decimal::from(days))
            .unwrap_or(Decimal::MAX);
        Money(fine)
    }
}

impl Default for DailyRate {
    fn default() -> Self {
        Self(dec!(0.50))
    }
}

impl TryFrom<Decimal> for DailyRate {
    type Error = LendingError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<DailyRate> for Decimal {
    fn from(rate: DailyRate) -> Self {
        rate.0
    }
}
