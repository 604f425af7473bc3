//! Interpreting the URL the payment processor redirects back to.

use tradedesk_core::CheckoutSessionId;
use url::Url;

/// Query parameter carrying the checkout session id.
pub const SESSION_ID_PARAM: &str = "session_id";
/// Query parameter carrying the checkout result (`success` or `cancelled`).
pub const PAYMENT_PARAM: &str = "payment";

/// What a page load asks the payment flow to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnAction {
    /// `payment=success` with a session id: confirm by polling.
    Confirm(CheckoutSessionId),
    /// `payment=cancelled`: the user backed out of checkout.
    Cancelled,
    /// Not a payment return.
    None,
}

/// Decide what a return URL asks for.
#[must_use]
pub fn interpret(url: &Url) -> ReturnAction {
    let mut session_id = None;
    let mut payment = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            SESSION_ID_PARAM if session_id.is_none() => session_id = Some(value.into_owned()),
            PAYMENT_PARAM if payment.is_none() => payment = Some(value.into_owned()),
            _ => {}
        }
    }

    match (payment.as_deref(), session_id) {
        (Some("success"), Some(id)) if !id.is_empty() => {
            ReturnAction::Confirm(CheckoutSessionId::new(id))
        }
        (Some("cancelled"), _) => ReturnAction::Cancelled,
        _ => ReturnAction::None,
    }
}

/// Remove `session_id` and `payment` from the query, keeping everything else.
#[must_use]
pub fn strip_payment_params(url: &Url) -> Url {
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != SESSION_ID_PARAM && key != PAYMENT_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut cleaned = url.clone();
    if kept.is_empty() {
        cleaned.set_query(None);
    } else {
        cleaned.query_pairs_mut().clear().extend_pairs(kept);
    }
    cleaned
}
