//! Fixed-point token amounts
//!
//! Ledger amounts travel as strings such as `"5.000 HIVE"` or
//! `"1234.567890 VESTS"`. They are kept as an integer count of the smallest
//! unit so that comparisons are exact.

use crate::error::CuratorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Token amount with an explicit decimal precision
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Asset {
    /// Amount in the smallest unit (`5.000` at precision 3 is `5000`)
    pub amount: i64,
    pub precision: u8,
    pub symbol: String,
}

impl Asset {
    /// Precision used by liquid tokens on all supported ledgers
    pub const TOKEN_PRECISION: u8 = 3;
    /// Precision used by vesting shares
    pub const VESTS_PRECISION: u8 = 6;

    pub fn new(amount: i64, precision: u8, symbol: impl Into<String>) -> Self {
        Self {
            amount,
            precision,
            symbol: symbol.into(),
        }
    }

    /// Whole token units at liquid precision, e.g. `from_units(5, "HIVE")` is `5.000 HIVE`
    pub fn from_units(units: i64, symbol: impl Into<String>) -> Self {
        Self::new(
            units.saturating_mul(10i64.pow(Self::TOKEN_PRECISION as u32)),
            Self::TOKEN_PRECISION,
            symbol,
        )
    }

    /// Whether this is exactly `units` whole tokens of `symbol`
    pub fn is_whole_units(&self, units: i64, symbol: &str) -> bool {
        if self.symbol != symbol {
            return false;
        }
        let scale = 10i128.pow(self.precision as u32);
        self.amount as i128 == units as i128 * scale
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    /// Convert a vesting-share amount into liquid power using the global ratio
    ///
    /// Returns an amount at [`Asset::TOKEN_PRECISION`] in `fund`'s symbol,
    /// zero when the share supply is zero.
    pub fn vests_to_power(&self, fund: &Asset, shares: &Asset) -> Asset {
        if shares.amount == 0 {
            return Asset::new(0, Self::TOKEN_PRECISION, fund.symbol.clone());
        }
        // vests * fund / shares, rescaled from the inputs' precisions to 3 decimals
        let numerator = self.amount as i128 * fund.amount as i128;
        let target = Self::TOKEN_PRECISION as i32;
        let exponent = target - fund.precision as i32 - self.precision as i32 + shares.precision as i32;
        let value = if exponent >= 0 {
            numerator * 10i128.pow(exponent as u32) / shares.amount as i128
        } else {
            numerator / (shares.amount as i128 * 10i128.pow((-exponent) as u32))
        };
        Asset::new(
            value.clamp(i64::MIN as i128, i64::MAX as i128) as i64,
            Self::TOKEN_PRECISION,
            fund.symbol.clone(),
        )
    }

    /// Decimal part without the symbol, e.g. `5.000`
    pub fn amount_string(&self) -> String {
        if self.precision == 0 {
            return self.amount.to_string();
        }
        let scale = 10u64.pow(self.precision as u32);
        let sign = if self.amount < 0 { "-" } else { "" };
        let abs = self.amount.unsigned_abs();
        format!(
            "{sign}{}.{:0width$}",
            abs / scale,
            abs % scale,
            width = self.precision as usize
        )
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.amount_string(), self.symbol)
    }
}

impl FromStr for Asset {
    type Err = CuratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CuratorError::Validation(format!("invalid asset: {s:?}"));

        let mut parts = s.split_whitespace();
        let (number, symbol) = match (parts.next(), parts.next(), parts.next()) {
            (Some(number), Some(symbol), None) => (number, symbol),
            _ => return Err(invalid()),
        };
        if symbol.is_empty() || symbol.len() > 7 || !symbol.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(invalid());
        }

        let (negative, digits) = match number.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, number),
        };
        let (whole, fraction) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty()
            || fraction.len() > 18
            || !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }

        let precision = fraction.len() as u8;
        let whole: i64 = whole.parse().map_err(|_| invalid())?;
        let fraction: i64 = if fraction.is_empty() {
            0
        } else {
            fraction.parse().map_err(|_| invalid())?
        };
        let amount = whole
            .checked_mul(10i64.pow(precision as u32))
            .and_then(|v| v.checked_add(fraction))
            .ok_or_else(invalid)?;

        Ok(Asset::new(
            if negative { -amount } else { amount },
            precision,
            symbol,
        ))
    }
}

impl TryFrom<String> for Asset {
    type Error = CuratorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.to_string()
    }
}
