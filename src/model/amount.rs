//! Amount type for handling monetary values with optional currency symbols.
//!
//! This module provides the `Amount` type which wraps `Decimal` and handles parsing the loosely
//! formatted money cells found in dashboard exports, e.g. `₹1,20,000.50`, `-$50`, `(1,200.00)`.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// The currency symbol written when an amount is formatted for presentation.
pub const CURRENCY_SYMBOL: &str = "₹";

/// Prefixes that are stripped when parsing. Checked in order, so `Rs.` must precede `Rs`.
const CURRENCY_PREFIXES: &[&str] = &["₹", "$", "Rs.", "Rs", "INR"];

/// Represents how amounts were (or should be) formatted.
///
/// # Examples
///  - `AmountFormat{ symbol: true, commas: true }` -> `-₹60,000.00`
///  - `AmountFormat{ symbol: false, commas: true }` -> `-60,000.00`
///  - `AmountFormat{ symbol: false, commas: false }` -> `-60000.00`
///  - `AmountFormat{ symbol: true, commas: false }` -> `-₹60000.00`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AmountFormat {
    /// Whether a currency symbol is present in the formatting.
    symbol: bool,
    /// Whether commas are present as thousands separators in the formatting.
    commas: bool,
}

impl AmountFormat {
    /// A bare number with two decimal places, e.g. `-60000.00`. Used for machine-readable output.
    pub const PLAIN: AmountFormat = AmountFormat {
        symbol: false,
        commas: false,
    };

    /// Currency symbol and thousands separators, e.g. `-₹60,000.00`. Used for presentation.
    pub const CURRENCY: AmountFormat = AmountFormat {
        symbol: true,
        commas: true,
    };
}

impl Default for AmountFormat {
    fn default() -> Self {
        AmountFormat::CURRENCY
    }
}

/// Represents a monetary amount.
///
/// Formatting is considered significant for the purposes of equality, so for numeric comparisons,
/// you should access the `Decimal` value and use that.
///
/// ```
/// # use cod_risk::model::Amount;
/// # use std::str::FromStr;
/// let a = Amount::from_str("-5000.00").unwrap();
/// let b = Amount::from_str("-₹5,000.00").unwrap();
/// assert_ne!(a, b);
/// assert_eq!(a.value(), b.value());
/// assert_eq!(b.to_string(), "-₹5,000.00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount {
    /// The parsed numerical value.
    value: Decimal,
    /// The way the numerical value was parsed from, or should be written to, a `String`.
    format: AmountFormat,
}

impl Amount {
    /// Creates a new Amount from a Decimal value with currency formatting.
    pub const fn new(value: Decimal) -> Self {
        Self {
            value,
            format: AmountFormat::CURRENCY,
        }
    }

    /// Creates a new Amount from a Decimal value with the specified formatting.
    pub const fn new_with_format(value: Decimal, format: AmountFormat) -> Self {
        Self { value, format }
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.value
    }

    /// Returns the same value with a different format.
    pub fn with_format(self, format: AmountFormat) -> Self {
        Self { format, ..self }
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.value().is_zero()
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.value().is_sign_negative()
    }
}

/// An error that can occur when parsing strings into `Decimal` values.
pub struct AmountError(rust_decimal::Error);

impl Debug for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for AmountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl std::error::Error for AmountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    /// Blank input parses as zero. Callers that must tell blank from zero check for blank first.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(Amount::default());
        }

        // Accounting negatives: "(1,200.00)"
        let (negative, rest) = match trimmed
            .strip_prefix('(')
            .and_then(|inner| inner.strip_suffix(')'))
        {
            Some(inner) => (true, inner.trim()),
            None => match trimmed.strip_prefix('-') {
                Some(after_minus) => (true, after_minus.trim()),
                None => (false, trimmed),
            },
        };

        let (symbol, rest) = match CURRENCY_PREFIXES.iter().find_map(|p| rest.strip_prefix(*p)) {
            Some(after) => (true, after.trim()),
            None => (false, rest),
        };

        // Allow "₹-50" as well as "-₹50"
        let (negative, rest) = match rest.strip_prefix('-') {
            Some(after) => (!negative, after),
            None => (negative, rest),
        };

        let without_commas = rest.replace(',', "");
        let commas = without_commas.len() < rest.len();

        let magnitude = Decimal::from_str(&without_commas).map_err(AmountError)?;
        let value = if negative { -magnitude } else { magnitude };
        Ok(Amount {
            value,
            format: AmountFormat { symbol, commas },
        })
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (sign, num) = if self.is_negative() {
            ("-", self.value().abs())
        } else {
            ("", self.value().abs())
        };

        let sym = if self.format.symbol {
            CURRENCY_SYMBOL
        } else {
            ""
        };

        if self.format.commas {
            write!(
                f,
                "{sign}{sym}{}",
                format_num::format_num!(",.2", num.to_f64().unwrap_or_default())
            )
        } else {
            write!(f, "{sign}{sym}{:.2}", num)
        }
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Amount::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.value()
    }
}
