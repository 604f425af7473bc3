//! Client-side form validation.
//!
//! Forms are plain structs filled by the front end. `validate` either returns
//! the typed request to send or a [`ValidationErrors`] map keyed by field, and
//! always runs before any network call.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use tradedesk_core::{AccountType, Email, EmailError, Leverage, OrderSide};

use crate::api::types::{CheckoutRequest, OrderRequest, RegisterRequest, WithdrawalRequest};

const MIN_PASSWORD_LEN: usize = 6;
const DEFAULT_SYMBOL: &str = "EURUSD";
const DEFAULT_VOLUME: f64 = 0.01;
const DEFAULT_WITHDRAWAL_DESCRIPTION: &str = "Funds withdrawal";

/// Field-keyed validation messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("{}", summarize(.fields))]
pub struct ValidationErrors {
    fields: BTreeMap<&'static str, String>,
}

fn summarize(fields: &BTreeMap<&'static str, String>) -> String {
    fields
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for `field`. The first message per field wins.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.fields.entry(field).or_insert_with(|| message.into());
    }

    /// Message for `field`, if it failed.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.fields.iter().map(|(k, v)| (*k, v.as_str()))
    }

    fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, Self> {
        if self.is_empty() { Ok(value()) } else { Err(self) }
    }
}

fn email_message(err: &EmailError) -> &'static str {
    match err {
        EmailError::Empty => "Email is required",
        _ => "Email is invalid",
    }
}

// =============================================================================
// Auth forms
// =============================================================================

/// Login form.
#[derive(Debug, Clone)]
pub struct LoginForm {
    pub email: String,
    pub password: SecretString,
}

impl LoginForm {
    /// Check the form; returns the parsed email on success.
    ///
    /// # Errors
    ///
    /// Returns field errors for `email` and `password`.
    pub fn validate(&self) -> Result<Email, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let email = Email::parse(self.email.trim())
            .map_err(|e| errors.add("email", email_message(&e)))
            .ok();

        if self.password.expose_secret().is_empty() {
            errors.add("password", "Password is required");
        }

        match email {
            Some(email) => errors.into_result(|| email),
            None => Err(errors),
        }
    }
}

/// Registration form.
#[derive(Debug, Clone)]
pub struct RegistrationForm {
    pub email: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

impl RegistrationForm {
    /// Check every field and build the registration request.
    ///
    /// # Errors
    ///
    /// Returns all field errors at once.
    pub fn validate(&self) -> Result<RegisterRequest, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let email = Email::parse(self.email.trim())
            .map_err(|e| errors.add("email", email_message(&e)))
            .ok();

        let password = self.password.expose_secret();
        if password.is_empty() {
            errors.add("password", "Password is required");
        } else if password.chars().count() < MIN_PASSWORD_LEN {
            errors.add(
                "password",
                format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
            );
        }

        let confirm = self.confirm_password.expose_secret();
        if confirm.is_empty() {
            errors.add("confirm_password", "Please confirm your password");
        } else if confirm != password {
            errors.add("confirm_password", "Passwords do not match");
        }

        let first_name = self.first_name.trim();
        if first_name.is_empty() {
            errors.add("first_name", "First name is required");
        }
        let last_name = self.last_name.trim();
        if last_name.is_empty() {
            errors.add("last_name", "Last name is required");
        }

        let phone = self.phone.trim();
        if !phone.is_empty() && !is_phone(phone) {
            errors.add("phone", "Phone number is invalid");
        }

        let Some(email) = email else {
            return Err(errors);
        };

        errors.into_result(|| RegisterRequest {
            email,
            password: self.password.clone(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            phone: (!phone.is_empty()).then(|| phone.to_string()),
        })
    }
}

fn is_phone(s: &str) -> bool {
    s.chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '+' | '(' | ')'))
}

// =============================================================================
// Trading forms
// =============================================================================

/// Order entry form.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    pub symbol: String,
    pub side: OrderSide,
    pub volume: f64,
    pub leverage: Leverage,
}

impl Default for OrderDraft {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            side: OrderSide::Buy,
            volume: DEFAULT_VOLUME,
            leverage: Leverage::Unlimited,
        }
    }
}

impl OrderDraft {
    /// Check the draft and build the order, stamped with `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns field errors for `symbol`, `volume` and `leverage`.
    pub fn validate(
        &self,
        account_type: AccountType,
        timestamp: String,
    ) -> Result<OrderRequest, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let symbol = self.symbol.trim();
        if symbol.is_empty() {
            errors.add("symbol", "Symbol is required");
        }
        if !self.volume.is_finite() || self.volume <= 0.0 {
            errors.add("volume", "Volume must be greater than zero");
        }
        if !Leverage::CHOICES.contains(&self.leverage) {
            errors.add("leverage", format!("Leverage {} is not offered", self.leverage));
        }

        errors.into_result(|| OrderRequest {
            account_type,
            symbol: symbol.to_uppercase(),
            order_type: self.side,
            volume: self.volume,
            leverage: self.leverage,
            timestamp,
        })
    }
}

/// Parse a user-entered amount that must be strictly positive.
fn positive_amount(raw: &str, errors: &mut ValidationErrors) -> Option<Decimal> {
    let raw = raw.trim();
    if raw.is_empty() {
        errors.add("amount", "Amount is required");
        return None;
    }
    match raw.parse::<Decimal>() {
        Ok(amount) if amount > Decimal::ZERO => Some(amount),
        Ok(_) => {
            errors.add("amount", "Amount must be greater than zero");
            None
        }
        Err(_) => {
            errors.add("amount", "Amount must be a number");
            None
        }
    }
}

/// Deposit form.
#[derive(Debug, Clone, Default)]
pub struct DepositDraft {
    pub amount: String,
}

impl DepositDraft {
    /// # Errors
    ///
    /// Returns an `amount` error if the amount is missing, malformed or not
    /// positive.
    pub fn validate(&self, account_type: AccountType) -> Result<CheckoutRequest, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        match positive_amount(&self.amount, &mut errors) {
            Some(amount) => Ok(CheckoutRequest {
                account_type,
                amount,
            }),
            None => Err(errors),
        }
    }
}

/// Withdrawal form.
#[derive(Debug, Clone, Default)]
pub struct WithdrawalDraft {
    pub amount: String,
    pub description: String,
}

impl WithdrawalDraft {
    /// # Errors
    ///
    /// Returns an `amount` error if the amount is missing, malformed or not
    /// positive.
    pub fn validate(
        &self,
        account_type: AccountType,
    ) -> Result<WithdrawalRequest, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let Some(amount) = positive_amount(&self.amount, &mut errors) else {
            return Err(errors);
        };

        let description = match self.description.trim() {
            "" => DEFAULT_WITHDRAWAL_DESCRIPTION.to_string(),
            d => d.to_string(),
        };

        Ok(WithdrawalRequest {
            account_type,
            amount,
            description,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn secret(s: &str) -> SecretString {
        SecretString::from(s.to_string())
    }

    fn registration() -> RegistrationForm {
        RegistrationForm {
            email: " ada@example.com ".to_string(),
            password: secret("secret1"),
            confirm_password: secret("secret1"),
            first_name: "  Ada ".to_string(),
            last_name: "Lovelace".to_string(),
            phone: String::new(),
        }
    }

    #[test]
    fn test_registration_valid() {
        let request = registration().validate().unwrap();
        assert_eq!(request.email.as_str(), "ada@example.com");
        assert_eq!(request.first_name, "Ada");
        assert!(request.phone.is_none());
    }

    #[test]
    fn test_registration_collects_all_errors() {
        let form = RegistrationForm {
            email: "not-an-email".to_string(),
            password: secret("abc"),
            confirm_password: secret("abd"),
            first_name: "   ".to_string(),
            last_name: String::new(),
            phone: "call me".to_string(),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.len(), 6);
        assert_eq!(errors.get("email"), Some("Email is invalid"));
        assert_eq!(
            errors.get("password"),
            Some("Password must be at least 6 characters")
        );
        assert_eq!(errors.get("confirm_password"), Some("Passwords do not match"));
        assert!(errors.get("phone").is_some());
    }

    #[test]
    fn test_registration_phone_characters() {
        let mut form = registration();
        form.phone = "+33 (0)6-12-34-56-78".to_string();
        assert_eq!(
            form.validate().unwrap().phone.as_deref(),
            Some("+33 (0)6-12-34-56-78")
        );
    }

    #[test]
    fn test_login_requires_both_fields() {
        let form = LoginForm {
            email: String::new(),
            password: secret(""),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("email"), Some("Email is required"));
        assert_eq!(errors.get("password"), Some("Password is required"));
    }

    #[test]
    fn test_order_defaults_are_valid() {
        let order = OrderDraft::default()
            .validate(AccountType::Demo, "2024-01-01T00:00:00Z".to_string())
            .unwrap();
        assert_eq!(order.symbol, "EURUSD");
        assert_eq!(order.leverage, Leverage::Unlimited);
        assert!((order.volume - 0.01).abs() < f64::EPSILON);
    }

    #[test]
    fn test_order_rejects_bad_volume_and_leverage() {
        let draft = OrderDraft {
            volume: 0.0,
            leverage: Leverage::Fixed(42),
            ..OrderDraft::default()
        };
        let errors = draft
            .validate(AccountType::Real, String::new())
            .unwrap_err();
        assert!(errors.get("volume").is_some());
        assert_eq!(errors.get("leverage"), Some("Leverage 42× is not offered"));

        let nan = OrderDraft {
            volume: f64::NAN,
            ..OrderDraft::default()
        };
        assert!(nan.validate(AccountType::Demo, String::new()).is_err());
    }

    #[test]
    fn test_deposit_amount() {
        let ok = DepositDraft {
            amount: "50.5".to_string(),
        };
        assert_eq!(
            ok.validate(AccountType::Real).unwrap().amount,
            Decimal::new(505, 1)
        );

        for bad in ["", "abc", "0", "-10"] {
            let draft = DepositDraft {
                amount: bad.to_string(),
            };
            assert!(draft.validate(AccountType::Demo).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_withdrawal_default_description() {
        let draft = WithdrawalDraft {
            amount: "25".to_string(),
            description: "  ".to_string(),
        };
        let request = draft.validate(AccountType::Real).unwrap();
        assert_eq!(request.description, "Funds withdrawal");
    }

    #[test]
    fn test_errors_display() {
        let mut errors = ValidationErrors::new();
        errors.add("volume", "Volume must be greater than zero");
        errors.add("amount", "Amount is required");
        errors.add("amount", "ignored");
        assert_eq!(
            errors.to_string(),
            "amount: Amount is required; volume: Volume must be greater than zero"
        );
    }
}
