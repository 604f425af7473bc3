//! Trading records reported by the backend.
//!
//! Prices and volumes are plain floats (the backend's own representation);
//! money amounts use [`Decimal`] so balances and P/L sums stay exact.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{PositionId, TransactionId};
use super::money::CurrencyCode;
use super::status::{OrderSide, TransactionStatus, TransactionType};

/// Leverage applied to an order or position.
///
/// On the wire leverage is an integer; the sentinel `999_999` means
/// "unlimited".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(from = "u32", into = "u32")]
pub enum Leverage {
    Fixed(u32),
    #[default]
    Unlimited,
}

impl Leverage {
    /// Wire value used by the backend for unlimited leverage.
    pub const UNLIMITED_SENTINEL: u32 = 999_999;

    /// Leverage choices offered by order entry.
    pub const CHOICES: [Self; 6] = [
        Self::Fixed(50),
        Self::Fixed(100),
        Self::Fixed(200),
        Self::Fixed(500),
        Self::Fixed(1000),
        Self::Unlimited,
    ];

    /// Wire value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        match self {
            Self::Fixed(n) => n,
            Self::Unlimited => Self::UNLIMITED_SENTINEL,
        }
    }
}

impl From<u32> for Leverage {
    fn from(value: u32) -> Self {
        if value == Self::UNLIMITED_SENTINEL {
            Self::Unlimited
        } else {
            Self::Fixed(value)
        }
    }
}

impl From<Leverage> for u32 {
    fn from(leverage: Leverage) -> Self {
        leverage.as_u32()
    }
}

impl fmt::Display for Leverage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(n) => write!(f, "{n}×"),
            Self::Unlimited => f.write_str("∞"),
        }
    }
}

/// Live bid/ask quote for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub bid: f64,
    pub ask: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread: Option<f64>,
}

impl Quote {
    /// Placeholder quote used when a symbol has no live price yet.
    #[must_use]
    pub fn zero(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_owned(),
            bid: 0.0,
            ask: 0.0,
            spread: None,
        }
    }

    /// Price an order on this side would execute at (buy at ask, sell at bid).
    #[must_use]
    pub const fn price_for(&self, side: OrderSide) -> f64 {
        match side {
            OrderSide::Buy => self.ask,
            OrderSide::Sell => self.bid,
        }
    }
}

/// Find the quote for `symbol`, or a zero quote when it is not listed.
#[must_use]
pub fn quote_for(quotes: &[Quote], symbol: &str) -> Quote {
    quotes
        .iter()
        .find(|q| q.symbol == symbol)
        .cloned()
        .unwrap_or_else(|| Quote::zero(symbol))
}

/// Account balance summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub equity: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub margin: Option<Decimal>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub free_margin: Option<Decimal>,
    #[serde(default)]
    pub currency: CurrencyCode,
}

/// An open position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub position_id: PositionId,
    pub symbol: String,
    pub order_type: OrderSide,
    pub volume: f64,
    pub leverage: Leverage,
    pub open_price: f64,
    pub current_price: f64,
    #[serde(with = "rust_decimal::serde::float")]
    pub profit_loss: Decimal,
}

/// Sum of unrealised P/L across open positions.
#[must_use]
pub fn total_profit_loss(positions: &[Position]) -> Decimal {
    positions.iter().map(|p| p.profit_loss).sum()
}

/// A closed trade from the account history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub position_id: PositionId,
    pub symbol: String,
    pub order_type: OrderSide,
    pub volume: f64,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub profit_loss: Option<Decimal>,
    #[serde(default)]
    pub close_reason: Option<String>,
}

/// A ledger entry (deposit, withdrawal or recharge).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: TransactionId,
    pub transaction_type: TransactionType,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub status: TransactionStatus,
    pub timestamp: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl Transaction {
    /// Amount with the sign it has on the balance.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        if self.transaction_type.is_credit() {
            self.amount
        } else {
            -self.amount
        }
    }
}
