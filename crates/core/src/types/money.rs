//! Money representation using decimal arithmetic.
//!
//! The backend reports balances in major units (euros) but the payment
//! processor reports settled checkout amounts in minor units (cents).
//! [`MinorUnits`] keeps the two from being confused.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An amount expressed in the smallest currency unit (e.g. cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MinorUnits(i64);

impl MinorUnits {
    /// Wrap a raw minor-unit amount.
    #[must_use]
    pub const fn new(amount: i64) -> Self {
        Self(amount)
    }

    /// Get the raw minor-unit amount.
    #[must_use]
    pub const fn as_i64(&self) -> i64 {
        self.0
    }

    /// Convert to major units (divide by 100), keeping two decimal places.
    ///
    /// ```
    /// use tradedesk_core::MinorUnits;
    ///
    /// assert_eq!(MinorUnits::new(12345).to_major().to_string(), "123.45");
    /// assert_eq!(MinorUnits::new(5000).to_major().to_string(), "50.00");
    /// ```
    #[must_use]
    pub fn to_major(self) -> Decimal {
        Decimal::new(self.0, 2)
    }
}

impl From<i64> for MinorUnits {
    fn from(amount: i64) -> Self {
        Self(amount)
    }
}

/// ISO 4217 currency codes accepted by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    EUR,
    USD,
    GBP,
}

impl CurrencyCode {
    /// Display symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::EUR => "€",
            Self::USD => "$",
            Self::GBP => "£",
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            Self::EUR => "EUR",
            Self::USD => "USD",
            Self::GBP => "GBP",
        };
        f.write_str(code)
    }
}

/// Format a major-unit amount with exactly two decimal places.
#[must_use]
pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minor_to_major() {
        assert_eq!(MinorUnits::new(12345).to_major(), Decimal::new(12345, 2));
        assert_eq!(format_amount(MinorUnits::new(12345).to_major()), "123.45");
        assert_eq!(format_amount(MinorUnits::new(7).to_major()), "0.07");
        assert_eq!(format_amount(MinorUnits::new(0).to_major()), "0.00");
    }

    #[test]
    fn test_format_amount_rounds_to_cents() {
        assert_eq!(format_amount(Decimal::new(100_456, 3)), "100.46");
        assert_eq!(format_amount(Decimal::from(25)), "25.00");
    }

    #[test]
    fn test_currency_display() {
        assert_eq!(CurrencyCode::default().to_string(), "EUR");
        assert_eq!(CurrencyCode::EUR.symbol(), "€");
    }
}
