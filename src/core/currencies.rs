//! Currency rounding.
//!
//! Every amount produced by the calculator is rounded to a multiple of the
//! currency's rounding increment (0.001 for the Tunisian dinar, 0.01 for the
//! euro). Rounding is half away from zero, the same rule the ledger uses, so
//! that computed lines reconcile with posted journal items.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::error::FiscalError;

/// A currency with its smallest accountable increment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    /// ISO 4217 code, e.g. "TND".
    pub code: String,
    /// Rounding increment, e.g. 0.001.
    pub rounding: Decimal,
}

impl Currency {
    /// Create a currency with an explicit rounding increment.
    pub fn new(code: impl Into<String>, rounding: Decimal) -> Self {
        Self {
            code: code.into(),
            rounding,
        }
    }

    /// Look up a known ISO 4217 code and derive its increment from the minor unit.
    pub fn from_code(code: &str) -> Option<Self> {
        let idx = CURRENCY_MINOR_UNITS
            .binary_search_by(|(c, _)| (*c).cmp(code))
            .ok()?;
        let (code, minor_units) = CURRENCY_MINOR_UNITS[idx];
        Some(Self::new(code, Decimal::new(1, minor_units)))
    }

    /// Tunisian dinar (millimes, three decimals).
    pub fn tnd() -> Self {
        Self::new("TND", Decimal::new(1, 3))
    }

    /// Euro (cents).
    pub fn eur() -> Self {
        Self::new("EUR", Decimal::new(1, 2))
    }

    /// Round `value` to this currency's increment.
    pub fn round(&self, value: Decimal) -> Result<Decimal, FiscalError> {
        round_to_increment(value, self.rounding)
    }

    /// Whether `value` rounds to zero in this currency.
    pub fn is_zero(&self, value: Decimal) -> bool {
        if self.rounding <= Decimal::ZERO {
            return value.is_zero();
        }
        value.abs() < self.rounding / Decimal::new(2, 0)
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::tnd()
    }
}

/// Round `value` to the nearest multiple of `increment`, half away from zero.
///
/// A non-positive increment leaves the value untouched. Powers of ten
/// (0.01, 0.001, ...) round in place; other increments such as 0.05 divide
/// first and fail with [`FiscalError::Arithmetic`] when the quotient is out
/// of range.
pub fn round_to_increment(value: Decimal, increment: Decimal) -> Result<Decimal, FiscalError> {
    if increment <= Decimal::ZERO {
        return Ok(value);
    }
    let normalized = increment.normalize();
    if normalized.mantissa() == 1 {
        return Ok(value.round_dp_with_strategy(
            normalized.scale(),
            RoundingStrategy::MidpointAwayFromZero,
        ));
    }
    value
        .checked_div(increment)
        .map(|steps| steps.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|steps| steps.checked_mul(increment))
        .ok_or_else(|| {
            FiscalError::Arithmetic(format!("cannot round {value} to a multiple of {increment}"))
        })
}

/// Check whether `code` is a known ISO 4217 currency code.
pub fn is_known_currency_code(code: &str) -> bool {
    CURRENCY_MINOR_UNITS
        .binary_search_by(|(c, _)| (*c).cmp(code))
        .is_ok()
}

/// ISO 4217 codes with their number of minor-unit digits.
/// Sorted for binary search.
static CURRENCY_MINOR_UNITS: &[(&str, u32)] = &[
    ("AED", 2), // UAE Dirham
    ("BHD", 3), // Bahraini Dinar
    ("CAD", 2), // Canadian Dollar
    ("CHF", 2), // Swiss Franc
    ("CNY", 2), // Chinese Yuan
    ("DZD", 2), // Algerian Dinar
    ("EGP", 2), // Egyptian Pound
    ("EUR", 2), // Euro
    ("GBP", 2), // Pound Sterling
    ("JOD", 3), // Jordanian Dinar
    ("JPY", 0), // Japanese Yen
    ("KWD", 3), // Kuwaiti Dinar
    ("LYD", 3), // Libyan Dinar
    ("MAD", 2), // Moroccan Dirham
    ("OMR", 3), // Omani Rial
    ("QAR", 2), // Qatari Riyal
    ("SAR", 2), // Saudi Riyal
    ("TND", 3), // Tunisian Dinar
    ("TRY", 2), // Turkish Lira
    ("USD", 2), // US Dollar
];
