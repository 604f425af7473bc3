//! Request and response bodies of the backend's JSON endpoints.

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use tradedesk_core::{
    AccountType, Email, Leverage, MinorUnits, OrderSide, PositionId, UserId, UserProfile,
};

/// Successful login or registration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub user_id: UserId,
    #[serde(default)]
    pub user_profile: Option<UserProfile>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `POST /api/auth/login` body.
#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    #[serde(serialize_with = "expose")]
    pub password: &'a SecretString,
}

/// `POST /api/auth/register` body, produced by
/// [`RegistrationForm::validate`](crate::validation::RegistrationForm::validate).
#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub email: Email,
    #[serde(serialize_with = "expose")]
    pub password: SecretString,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("phone", &self.phone)
            .finish()
    }
}

impl RegisterRequest {
    /// Profile the session holds after a successful registration.
    #[must_use]
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            email: self.email.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            phone: self.phone.clone(),
        }
    }
}

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// `POST /api/orders` body.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRequest {
    pub account_type: AccountType,
    pub symbol: String,
    pub order_type: OrderSide,
    pub volume: f64,
    pub leverage: Leverage,
    /// RFC 3339 submission time.
    pub timestamp: String,
}

/// Result of a placed order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderReceipt {
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub position_id: Option<PositionId>,
    #[serde(default)]
    pub status: String,
}

/// Result of closing a position.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CloseReceipt {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub close_price: Option<f64>,
}

/// `POST /api/stripe/checkout/session` body.
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutRequest {
    pub account_type: AccountType,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

/// Checkout creation result.
///
/// Real accounts get a hosted checkout `url`; demo accounts are credited
/// on the spot and only receive a `message`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutResponse {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// `GET /api/stripe/checkout/status/{id}` result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutStatus {
    #[serde(default)]
    pub payment_status: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub amount_total: Option<MinorUnits>,
}

impl CheckoutStatus {
    #[must_use]
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.status == "expired"
    }
}

/// `POST /api/stripe/withdrawal` body.
#[derive(Debug, Clone, Serialize)]
pub struct WithdrawalRequest {
    pub account_type: AccountType,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub description: String,
}

/// Withdrawal result.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WithdrawalResponse {
    pub message: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_balance: Decimal,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_exposes_password_only_on_the_wire() {
        let request = RegisterRequest {
            email: Email::parse("ada@example.com").unwrap(),
            password: SecretString::from("hunter22".to_string()),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            phone: None,
        };

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["password"], "hunter22");
        assert!(json.get("phone").is_none());
        assert!(!format!("{request:?}").contains("hunter22"));
    }

    #[test]
    fn test_order_request_encodes_unlimited_leverage() {
        let order = OrderRequest {
            account_type: AccountType::Demo,
            symbol: "EURUSD".to_string(),
            order_type: OrderSide::Sell,
            volume: 0.01,
            leverage: Leverage::Unlimited,
            timestamp: "2024-01-01T00:00:00Z".to_string(),
        };
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["leverage"], 999_999);
        assert_eq!(json["order_type"], "sell");
        assert_eq!(json["account_type"], "demo");
    }

    #[test]
    fn test_checkout_status_flags() {
        let status: CheckoutStatus = serde_json::from_str(
            r#"{"payment_status": "paid", "status": "complete", "amount_total": 12345}"#,
        )
        .unwrap();
        assert!(status.is_paid());
        assert!(!status.is_expired());
        assert_eq!(status.amount_total.unwrap().to_major().to_string(), "123.45");

        let expired: CheckoutStatus =
            serde_json::from_str(r#"{"payment_status": "unpaid", "status": "expired"}"#).unwrap();
        assert!(expired.is_expired());
        assert!(expired.amount_total.is_none());
    }
}
