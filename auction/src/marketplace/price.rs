use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::config::{PRICE_DECIMALS, PRICE_SCALE};
use crate::error::{AuctionError, AuctionResult};

/// A non-negative decimal amount held in fixed-point atomic units.
///
/// Comparisons are exact, so `75.5 > 75` holds without floating-point
/// surprises. On the wire a price is a plain JSON number (`75`, `75.5`);
/// values with more than [`PRICE_DECIMALS`] fractional digits are rounded to
/// the nearest atomic unit when decoded from a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(u64);

impl Price {
    pub const ZERO: Self = Self(0);

    /// Price from raw atomic units.
    pub const fn from_atomic(units: u64) -> Self {
        Self(units)
    }

    /// Raw atomic units.
    pub const fn atomic(self) -> u64 {
        self.0
    }

    /// Price from a whole number of currency units.
    pub const fn whole(units: u64) -> Option<Self> {
        match units.checked_mul(PRICE_SCALE) {
            Some(atomic) => Some(Self(atomic)),
            None => None,
        }
    }

    /// Convert from a floating-point amount, rounding to the nearest atomic unit.
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn from_f64(value: f64) -> AuctionResult<Self> {
        if !value.is_finite() {
            return Err(AuctionError::InvalidPrice(format!("{value} is not finite")));
        }
        if value < 0.0 {
            return Err(AuctionError::InvalidPrice(format!("{value} is negative")));
        }
        let scaled = (value * PRICE_SCALE as f64).round();
        if scaled >= u64::MAX as f64 {
            return Err(AuctionError::InvalidPrice(format!("{value} is out of range")));
        }
        Ok(Self(scaled as u64))
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(self) -> f64 {
        let whole = (self.0 / PRICE_SCALE) as f64;
        let frac = (self.0 % PRICE_SCALE) as f64 / PRICE_SCALE as f64;
        whole + frac
    }

    const fn is_whole(self) -> bool {
        self.0 % PRICE_SCALE == 0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / PRICE_SCALE;
        let frac = self.0 % PRICE_SCALE;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{frac:0width$}", width = PRICE_DECIMALS as usize);
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl FromStr for Price {
    type Err = AuctionError;

    /// Exact decimal parse, e.g. `"75.5"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let invalid = || AuctionError::InvalidPrice(format!("'{s}' is not a decimal amount"));

        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        if frac.len() > PRICE_DECIMALS as usize {
            return Err(AuctionError::InvalidPrice(format!(
                "'{s}' has more than {PRICE_DECIMALS} fractional digits"
            )));
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let frac_units: u64 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{frac:0<width$}", width = PRICE_DECIMALS as usize);
            padded.parse().map_err(|_| invalid())?
        };

        whole
            .checked_mul(PRICE_SCALE)
            .and_then(|units| units.checked_add(frac_units))
            .map(Self)
            .ok_or_else(|| AuctionError::InvalidPrice(format!("'{s}' is out of range")))
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_whole() {
            serializer.serialize_u64(self.0 / PRICE_SCALE)
        } else {
            serializer.serialize_f64(self.to_f64())
        }
    }
}

struct PriceVisitor;

impl Visitor<'_> for PriceVisitor {
    type Value = Price;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative decimal amount")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Price, E> {
        Price::whole(v).ok_or_else(|| E::custom(format!("price {v} is out of range")))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Price, E> {
        let v = u64::try_from(v).map_err(|_| E::custom(format!("price {v} is negative")))?;
        self.visit_u64(v)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Price, E> {
        Price::from_f64(v).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Price, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PriceVisitor)
    }
}
