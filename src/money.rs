//! Integer-cent money and bet limits
//!
//! Balances, stakes and payouts are carried as whole cents so that sums of
//! integer-multiplier payouts (roulette, wheel) never drift. Fractional
//! multipliers round to the nearest cent at the single point where a payout is
//! computed.

use crate::errors::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Smallest accepted stake
pub const MIN_BET: Money = Money::from_cents(20);

/// Largest accepted stake
pub const MAX_BET: Money = Money::from_cents(100_000);

/// Signed amount of currency in cents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    /// Convert a decimal amount, rounding to the nearest cent
    pub fn from_decimal(value: f64) -> Self {
        Self((value * 100.0).round() as i64)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub fn as_decimal(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Apply a fractional multiplier, rounding to the nearest cent
    pub fn scale(self, multiplier: f64) -> Money {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Money::ZERO;
        }
        Money((self.0 as f64 * multiplier).round() as i64)
    }

    /// Apply an integer multiplier exactly
    pub fn times(self, factor: u32) -> Money {
        Money(self.0.saturating_mul(factor as i64))
    }

    pub fn checked_sub(self, other: Money) -> Option<Money> {
        self.0.checked_sub(other.0).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        *self = *self - rhs;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

/// Inclusive stake bounds for one game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetLimits {
    pub min: Money,
    pub max: Money,
}

impl Default for BetLimits {
    fn default() -> Self {
        Self {
            min: MIN_BET,
            max: MAX_BET,
        }
    }
}

impl BetLimits {
    pub fn new(min: Money, max: Money) -> Self {
        Self { min, max }
    }

    pub fn check(&self, stake: Money) -> Result<(), ValidationError> {
        if stake < self.min || stake > self.max {
            return Err(ValidationError::StakeOutOfBounds {
                stake,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    /// Clamp a requested stake into range, the way the bet input field does
    pub fn clamp(&self, stake: Money) -> Money {
        stake.clamp(self.min, self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_conversion() {
        assert_eq!(Money::from_decimal(0.20), MIN_BET);
        assert_eq!(Money::from_decimal(1000.0), MAX_BET);
        assert_eq!(Money::from_decimal(15.0).cents(), 1500);
        assert_eq!(Money::from_cents(1237).to_string(), "12.37");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
    }

    #[test]
    fn test_scale_rounds_to_nearest_cent() {
        let stake = Money::from_decimal(10.0);
        assert_eq!(stake.scale(1.5), Money::from_decimal(15.0));
        assert_eq!(stake.scale(1.2375), Money::from_cents(1238));
        assert_eq!(stake.scale(0.0), Money::ZERO);
        assert_eq!(stake.scale(f64::NAN), Money::ZERO);
    }

    #[test]
    fn test_integer_multiplier_is_exact() {
        let stake = Money::from_cents(333);
        assert_eq!(stake.times(36).cents(), 11_988);
    }

    #[test]
    fn test_bet_limits() {
        let limits = BetLimits::default();
        assert!(limits.check(Money::from_cents(20)).is_ok());
        assert!(limits.check(Money::from_cents(100_000)).is_ok());
        assert!(limits.check(Money::from_cents(19)).is_err());
        assert!(limits.check(Money::from_cents(100_001)).is_err());
        assert_eq!(limits.clamp(Money::from_cents(5)), MIN_BET);
    }

    #[test]
    fn test_sum() {
        let total: Money = [Money::from_cents(150), Money::from_cents(250)].iter().sum();
        assert_eq!(total, Money::from_cents(400));
    }
}
