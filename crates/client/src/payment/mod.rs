//! Redirect-based deposit flow.
//!
//! A real-account deposit sends the user to the payment processor's hosted
//! checkout. When the processor redirects back, the page URL carries
//! `session_id` and `payment`; [`PaymentConfirmation::on_page_load`] reads
//! them and, for a successful return, drives a [`PaymentPoller`] until the
//! backend reports the payment as settled.

mod confirmation;
mod deposit;
mod poller;
mod return_url;

pub use confirmation::{PageLoad, PaymentConfirmation, REFRESH_DELAY};
pub use deposit::{DepositOutcome, DepositStrategy, Deposits};
pub use poller::{PaymentOutcome, PaymentPoller, PollPolicy, PollStep, StatusSource};
pub use return_url::{PAYMENT_PARAM, ReturnAction, SESSION_ID_PARAM, interpret, strip_payment_params};
