//! Monetary values as they appear in CSV cells.
//!
//! Bank exports write the same number in many ways: `1200.00`, `"1,200.00"`, `$1,200.00`,
//! `-$4.50`. The `Amount` type parses all of these into a `Decimal` and remembers whether a dollar
//! sign and thousands separators were present so that the value can be displayed the same way.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Characters that wrap a cell value and carry no meaning.
const QUOTES: &[char] = &['"', '\''];

/// Represents how dollar amounts were (or should be) formatted.
///
/// # Examples
///  - `AmountFormat{ dollar: true, commas: true }` -> `-$60,000.00`
///  - `AmountFormat{ dollar: false, commas: true }` -> `-60,000.00`
///  - `AmountFormat{ dollar: false, commas: false }` -> `-60000.00`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AmountFormat {
    dollar: bool,
    commas: bool,
}

impl Default for AmountFormat {
    fn default() -> Self {
        DEFAULT_FORMAT
    }
}

const DEFAULT_FORMAT: AmountFormat = AmountFormat {
    dollar: false,
    commas: true,
};

/// A parsed monetary value.
///
/// Formatting is significant for equality, so compare `value()` for numeric comparisons.
///
/// ```
/// # use budget_intake::model::Amount;
/// # use std::str::FromStr;
/// let a = Amount::from_str("\"1,200.00\"").unwrap();
/// let b = Amount::from_str("$1200.00").unwrap();
/// assert_ne!(a, b);
/// assert_eq!(a.value(), b.value());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount {
    value: Decimal,
    format: AmountFormat,
}

impl Amount {
    /// Creates a new Amount from a Decimal value with default `String` formatting.
    pub const fn new(value: Decimal) -> Self {
        Self {
            value,
            format: DEFAULT_FORMAT,
        }
    }

    /// Returns the underlying Decimal value.
    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn is_zero(&self) -> bool {
        self.value().is_zero()
    }

    /// Returns true if the amount is positive. Zero is neither positive nor negative.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.value().is_sign_positive()
    }

    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.value().is_sign_negative()
    }

    /// Parses a cell that may or may not hold an amount.
    ///
    /// Returns `None` when the cell is blank after removing quotes, whitespace and thousands
    /// separators, or when what remains is not a number. A `None` means "no amount in this
    /// column", which lets the caller move on to the next candidate column.
    pub fn parse_cell(raw: &str) -> Option<Self> {
        let cleaned = strip_cell(raw).replace(',', "");
        if cleaned.trim().is_empty() {
            return None;
        }
        Amount::from_str(raw).ok()
    }

    /// Parses a cell by keeping only digits, signs and the decimal point. Anything that still does
    /// not parse, including an empty cell, is zero.
    ///
    /// ```
    /// # use budget_intake::model::Amount;
    /// # use rust_decimal::Decimal;
    /// assert_eq!(Amount::parse_digits("$1,200.00 USD").value(), Decimal::new(120000, 2));
    /// assert!(Amount::parse_digits("n/a").is_zero());
    /// ```
    pub fn parse_digits(raw: &str) -> Self {
        let digits: String = raw
            .chars()
            .filter(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
            .collect();
        match Decimal::from_str(&digits) {
            Ok(value) => Amount::new(value),
            Err(_) => Amount::default(),
        }
    }
}

/// Removes surrounding whitespace and quote characters from a cell.
pub(crate) fn strip_cell(raw: &str) -> &str {
    raw.trim().trim_matches(QUOTES).trim()
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

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut dollar_sign = false;
        let trimmed = strip_cell(s);

        if trimmed.is_empty() {
            return Ok(Amount::default());
        }

        let without_dollar = if let Some(after_minus) = trimmed.strip_prefix('-') {
            // Negative number: could be "-$50.00" or "-50.00"
            if let Some(after_dollar) = after_minus.strip_prefix('$') {
                dollar_sign = true;
                format!("-{after_dollar}")
            } else {
                trimmed.to_string()
            }
        } else if let Some(after_dollar) = trimmed.strip_prefix('$') {
            dollar_sign = true;
            after_dollar.to_string()
        } else {
            trimmed.to_string()
        };

        let without_commas = without_dollar.replace(',', "");
        let commas = without_commas.len() < without_dollar.len();

        let value = Decimal::from_str(without_commas.trim()).map_err(AmountError)?;
        Ok(Amount {
            value,
            format: AmountFormat {
                dollar: dollar_sign,
                commas,
            },
        })
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let (sign, num) = if self.is_negative() {
            ("-", self.value().abs())
        } else {
            ("", self.value().abs())
        };

        let dol = if self.format.dollar { "$" } else { "" };

        if self.format.commas {
            write!(
                f,
                "{sign}{dol}{}",
                format_num::format_num!(",.2", num.to_f64().unwrap_or_default())
            )
        } else {
            write!(f, "{sign}{dol}{num}")
        }
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
