//! Decimal money and conversion to the payment provider's minor units.
//!
//! Prices travel through the storefront as [`Decimal`] major units
//! (`89.00` dollars). The payment provider only accepts integer minor units
//! (`8900` cents), so every amount crossing that boundary goes through
//! [`to_minor_units`] or [`from_minor_units`].

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of decimal places in a minor unit for every supported currency.
const MINOR_UNIT_SCALE: u32 = 2;

/// Largest distance from a whole minor unit still treated as float noise
/// (`0.30000000000000004` from a browser sum), in minor units.
const MINOR_UNIT_NOISE: Decimal = Decimal::from_parts(1, 0, 0, false, 6);

/// Errors converting a decimal amount to minor units.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MoneyError {
    /// Amount is below zero.
    #[error("amount cannot be negative: {0}")]
    Negative(Decimal),
    /// Amount lands well between two minor units (`10.005`).
    #[error("amount {0} has sub-cent precision")]
    SubMinorPrecision(Decimal),
    /// Amount does not fit in an `i64` of minor units.
    #[error("amount {0} is too large")]
    Overflow(Decimal),
}

/// Convert a major-unit amount to integer minor units (`12.34` -> `1234`).
///
/// The scaled amount is rounded half away from zero, so floating point
/// residue such as `89.10000000000001` becomes `8910`.
///
/// # Errors
///
/// Returns `MoneyError` if the amount is negative, is a genuine fraction of
/// a minor unit, or overflows `i64`.
pub fn to_minor_units(amount: Decimal) -> Result<i64, MoneyError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(MoneyError::Negative(amount));
    }

    let scaled = amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .ok_or(MoneyError::Overflow(amount))?;

    let rounded = scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    if (scaled - rounded).abs() > MINOR_UNIT_NOISE {
        return Err(MoneyError::SubMinorPrecision(amount));
    }

    rounded.to_i64().ok_or(MoneyError::Overflow(amount))
}

/// Convert integer minor units back to a major-unit amount (`24895` -> `248.95`).
#[must_use]
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, MINOR_UNIT_SCALE)
}

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (e.g., dollars, not cents).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// Build a price from the provider's minor units.
    #[must_use]
    pub fn from_minor_units(minor: i64, currency_code: CurrencyCode) -> Self {
        Self::new(from_minor_units(minor), currency_code)
    }

    /// Format for display, e.g. `$248.95`.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{}{:.2}", self.currency_code.symbol(), self.amount)
    }
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.display())
    }
}

/// ISO 4217 currency codes accepted by the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// Lowercase code as the payment provider expects it (`usd`).
    #[must_use]
    pub const fn as_provider_str(self) -> &'static str {
        match self {
            Self::USD => "usd",
            Self::EUR => "eur",
            Self::GBP => "gbp",
            Self::CAD => "cad",
            Self::AUD => "aud",
        }
    }

    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::USD | Self::CAD | Self::AUD => "$",
            Self::EUR => "€",
            Self::GBP => "£",
        }
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_provider_str())
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "usd" => Ok(Self::USD),
            "eur" => Ok(Self::EUR),
            "gbp" => Ok(Self::GBP),
            "cad" => Ok(Self::CAD),
            "aud" => Ok(Self::AUD),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_to_minor_units_whole_and_fractional() {
        assert_eq!(to_minor_units(Decimal::from(89)).unwrap(), 8900);
        assert_eq!(to_minor_units(Decimal::from_str("89.99").unwrap()).unwrap(), 8999);
        assert_eq!(to_minor_units(Decimal::from_str("0.5").unwrap()).unwrap(), 50);
        assert_eq!(to_minor_units(Decimal::ZERO).unwrap(), 0);
    }

    #[test]
    fn test_to_minor_units_trailing_zeros_are_integral() {
        assert_eq!(to_minor_units(Decimal::from_str("19.9500").unwrap()).unwrap(), 1995);
    }

    #[test]
    fn test_to_minor_units_rounds_float_residue() {
        let cases = [
            ("0.30000000000000004", 30),
            ("89.10000000000001", 8910),
            ("267.29999999999995", 26730),
        ];
        for (raw, expected) in cases {
            assert_eq!(to_minor_units(Decimal::from_str(raw).unwrap()).unwrap(), expected, "{raw}");
        }
    }

    #[test]
    fn test_to_minor_units_rejects_half_cent() {
        let amount = Decimal::from_str("10.005").unwrap();
        assert_eq!(
            to_minor_units(amount),
            Err(MoneyError::SubMinorPrecision(amount))
        );
    }

    #[test]
    fn test_to_minor_units_rejects_negative() {
        let amount = Decimal::from_str("-1.00").unwrap();
        assert_eq!(to_minor_units(amount), Err(MoneyError::Negative(amount)));
    }

    #[test]
    fn test_from_minor_units() {
        assert_eq!(from_minor_units(24895), Decimal::from_str("248.95").unwrap());
        assert_eq!(from_minor_units(995).to_string(), "9.95");
    }

    #[test]
    fn test_price_display() {
        let price = Price::from_minor_units(24895, CurrencyCode::USD);
        assert_eq!(price.display(), "$248.95");

        let whole = Price::new(Decimal::from(25), CurrencyCode::GBP);
        assert_eq!(whole.to_string(), "£25.00");
    }

    #[test]
    fn test_currency_code_parsing() {
        assert_eq!(CurrencyCode::from_str("USD").unwrap(), CurrencyCode::USD);
        assert_eq!(CurrencyCode::from_str("eur").unwrap(), CurrencyCode::EUR);
        assert!(CurrencyCode::from_str("btc").is_err());
        assert_eq!(CurrencyCode::CAD.as_provider_str(), "cad");
    }
}
