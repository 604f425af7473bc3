//! Status and kind enums shared across the client.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a string does not name a known variant.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseKindError {
    kind: &'static str,
    value: String,
}

impl ParseKindError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Trading account flavour.
///
/// Demo accounts are credited instantly on deposit; real accounts go through
/// the hosted payment checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    #[default]
    Demo,
    Real,
}

impl AccountType {
    /// Path segment / wire value.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Demo => "demo",
            Self::Real => "real",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountType {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "demo" => Ok(Self::Demo),
            "real" => Ok(Self::Real),
            _ => Err(ParseKindError::new("account type", s)),
        }
    }
}

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderSide {
    #[default]
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => f.write_str("buy"),
            Self::Sell => f.write_str("sell"),
        }
    }
}

impl std::str::FromStr for OrderSide {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(Self::Buy),
            "sell" => Ok(Self::Sell),
            _ => Err(ParseKindError::new("order side", s)),
        }
    }
}

/// Ledger entry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    StripeDeposit,
    StripeWithdrawal,
    Recharge,
    #[serde(other)]
    Other,
}

impl TransactionType {
    /// Whether the entry adds funds to the account.
    #[must_use]
    pub const fn is_credit(self) -> bool {
        matches!(self, Self::StripeDeposit | Self::Recharge)
    }
}

/// Ledger entry settlement status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Processing,
    Completed,
    #[serde(other)]
    Other,
}

/// Client-side status of a redirect-based payment confirmation.
///
/// This is derived locally from the checkout status responses; it is never
/// sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// First status query is in flight.
    Checking,
    /// The processor has not settled the payment yet.
    Processing,
    /// The payment is settled.
    Completed,
    /// The user cancelled the checkout, or the flow was cancelled locally.
    Cancelled,
    /// The checkout session expired before payment.
    Expired,
    /// The attempt budget ran out before a terminal answer.
    Timeout,
    /// A status query failed.
    Error,
}

/// Severity used to style the payment banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerSeverity {
    Info,
    Success,
    Warning,
    Error,
}

impl PaymentStatus {
    /// Terminal states are sticky: nothing happens after them without a new
    /// checkout redirect.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Checking | Self::Processing)
    }

    /// Banner text for this status.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Checking => "Checking payment...",
            Self::Processing => "Payment is being processed...",
            Self::Completed => "Payment successful!",
            Self::Cancelled => "Payment cancelled",
            Self::Expired => "Payment session expired",
            Self::Timeout => "Payment verification timed out",
            Self::Error => "Error while verifying payment",
        }
    }

    /// Banner severity for this status.
    #[must_use]
    pub const fn severity(self) -> BannerSeverity {
        match self {
            Self::Checking | Self::Processing => BannerSeverity::Info,
            Self::Completed => BannerSeverity::Success,
            Self::Cancelled => BannerSeverity::Warning,
            Self::Expired | Self::Timeout | Self::Error => BannerSeverity::Error,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Checking => "checking",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Timeout => "timeout",
            Self::Error => "error",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_account_type_roundtrip() {
        assert_eq!("demo".parse::<AccountType>().unwrap(), AccountType::Demo);
        assert_eq!("real".parse::<AccountType>().unwrap(), AccountType::Real);
        assert!("paper".parse::<AccountType>().is_err());
        assert_eq!(AccountType::Real.to_string(), "real");
    }

    #[test]
    fn test_unknown_transaction_kinds_deserialize() {
        let kind: TransactionType = serde_json::from_str("\"bonus\"").unwrap();
        assert_eq!(kind, TransactionType::Other);
        let status: TransactionStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(status, TransactionStatus::Other);
    }

    #[test]
    fn test_credit_kinds() {
        assert!(TransactionType::StripeDeposit.is_credit());
        assert!(TransactionType::Recharge.is_credit());
        assert!(!TransactionType::StripeWithdrawal.is_credit());
    }

    #[test]
    fn test_payment_status_terminality() {
        assert!(!PaymentStatus::Checking.is_terminal());
        assert!(!PaymentStatus::Processing.is_terminal());
        for status in [
            PaymentStatus::Completed,
            PaymentStatus::Cancelled,
            PaymentStatus::Expired,
            PaymentStatus::Timeout,
            PaymentStatus::Error,
        ] {
            assert!(status.is_terminal(), "{status} should be terminal");
        }
    }

    #[test]
    fn test_payment_banner_severity() {
        assert_eq!(PaymentStatus::Completed.severity(), BannerSeverity::Success);
        assert_eq!(PaymentStatus::Cancelled.severity(), BannerSeverity::Warning);
        assert_eq!(PaymentStatus::Timeout.severity(), BannerSeverity::Error);
        assert_eq!(PaymentStatus::Checking.severity(), BannerSeverity::Info);
    }
}
