//! Exact minor-unit token amounts.
//!
//! An [`Amount`] is a count of micro-units (10^-6 of a token). Keeping all
//! arithmetic in `u64` micro-units makes sums exact and sidesteps the
//! floating-point drift the decimal representation would invite; decimal
//! strings are parsed exactly at the boundary via `rust_decimal`.

use std::fmt;
use std::iter::Sum;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{Result, TypesError, MICRO_UNITS_PER_TOKEN, TOKEN_DECIMALS};

/// A non-negative token amount in micro-units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    /// Zero micro-units.
    pub const ZERO: Amount = Amount(0);

    /// Wrap a raw micro-unit count.
    pub const fn from_micro_units(micro: u64) -> Self {
        Self(micro)
    }

    /// A whole number of tokens.
    ///
    /// # Errors
    ///
    /// - [`TypesError::AmountOverflow`] if the micro-unit count overflows
    pub fn from_tokens(tokens: u64) -> Result<Self> {
        tokens
            .checked_mul(MICRO_UNITS_PER_TOKEN)
            .map(Self)
            .ok_or(TypesError::AmountOverflow)
    }

    /// The raw micro-unit count.
    pub fn micro_units(self) -> u64 {
        self.0
    }

    /// Whether this amount is zero.
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Checked multiplication by a scalar count.
    pub fn checked_mul(self, count: u64) -> Option<Amount> {
        self.0.checked_mul(count).map(Amount)
    }
}

impl Sum for Amount {
    /// Sums micro-units with saturation. Plan totals are bounded well below
    /// `u64::MAX`, and saturation keeps the ceiling comparison conservative.
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        Amount(iter.fold(0u64, |acc, a| acc.saturating_add(a.0)))
    }
}

impl FromStr for Amount {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| TypesError::InvalidAmount {
            input: s.to_string(),
            reason: reason.to_string(),
        };
        let decimal = Decimal::from_str(s.trim()).map_err(|e| TypesError::InvalidAmount {
            input: s.to_string(),
            reason: e.to_string(),
        })?;
        if decimal.is_sign_negative() {
            return Err(invalid("amount must not be negative"));
        }
        let scaled = decimal
            .checked_mul(Decimal::from(MICRO_UNITS_PER_TOKEN))
            .ok_or(TypesError::AmountOverflow)?;
        if !scaled.fract().is_zero() {
            return Err(invalid("more than 6 decimal places"));
        }
        scaled
            .to_u64()
            .map(Amount)
            .ok_or(TypesError::AmountOverflow)
    }
}

impl fmt::Display for Amount {
    /// Renders the full minor-unit precision, e.g. `12.500000`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:0width$}",
            self.0 / MICRO_UNITS_PER_TOKEN,
            self.0 % MICRO_UNITS_PER_TOKEN,
            width = TOKEN_DECIMALS as usize
        )
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
