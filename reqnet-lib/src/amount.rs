//! Signed ledger amounts.
//!
//! Expected amounts may start negative and balances move in both directions,
//! so the type is a signed 128-bit integer. All arithmetic is checked; an
//! overflow surfaces as a validation error instead of wrapping.
//!
//! Human-readable formats (JSON) carry the value as a decimal string so no
//! precision is lost in consumers that parse numbers as floats. Binary formats
//! carry the raw `i128`.

use crate::{LedgerError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Signed amount in the smallest unit of an asset.
///
/// # Examples
///
/// ```rust
/// use reqnet_lib::Amount;
///
/// let a = Amount::new(100);
/// let b = Amount::new(-30);
/// assert_eq!(a.checked_add(b).unwrap(), Amount::new(70));
/// assert_eq!("70".parse::<Amount>().unwrap(), Amount::new(70));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i128);

impl Amount {
    pub const ZERO: Amount = Amount(0);
    pub const MAX: Amount = Amount(i128::MAX);
    pub const MIN: Amount = Amount(i128::MIN);

    pub const fn new(value: i128) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> i128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Checked addition (returns None on overflow)
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Checked subtraction (returns None on overflow)
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn checked_mul(self, other: Self) -> Option<Self> {
        self.0.checked_mul(other.0).map(Self)
    }

    /// Integer division truncating toward zero. None when dividing by zero.
    pub fn checked_div(self, other: Self) -> Option<Self> {
        self.0.checked_div(other.0).map(Self)
    }

    pub fn checked_neg(self) -> Option<Self> {
        self.0.checked_neg().map(Self)
    }

    /// Addition that reports overflow as a ledger error naming `what`.
    pub fn add_or_overflow(self, other: Self, what: &'static str) -> Result<Self> {
        self.checked_add(other).ok_or(LedgerError::Overflow(what))
    }

    /// Subtraction that reports overflow as a ledger error naming `what`.
    pub fn sub_or_overflow(self, other: Self, what: &'static str) -> Result<Self> {
        self.checked_sub(other).ok_or(LedgerError::Overflow(what))
    }

    /// Sum a list of amounts, failing on overflow.
    pub fn sum<'a>(amounts: impl IntoIterator<Item = &'a Amount>, what: &'static str) -> Result<Self> {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, a| acc.add_or_overflow(*a, what))
    }
}

impl From<i128> for Amount {
    fn from(value: i128) -> Self {
        Self(value)
    }
}

impl From<i32> for Amount {
    fn from(value: i32) -> Self {
        Self(value as i128)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self(value as i128)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(value as i128)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        s.trim()
            .parse::<i128>()
            .map(Self)
            .map_err(|e| LedgerError::invalid_input("amount", format!("{s:?}: {e}")))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(&self.0)
        } else {
            serializer.serialize_i128(self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            i128::deserialize(deserializer).map(Self)
        }
    }
}
