//! Checkout status polling.
//!
//! After the payment processor redirects back, the processor may not have
//! settled the payment yet. [`PaymentPoller`] asks the backend for the checkout
//! status at a fixed interval until it gets a terminal answer or runs out of
//! attempts:
//!
//! ```text
//! checking ─┬─> processing ─> ... ─┬─> completed
//!           │                      ├─> expired
//!           │                      ├─> timeout
//!           │                      └─> error
//!           └─> (cancel at any suspension point) ─> cancelled
//! ```

use std::future::Future;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tradedesk_core::{CheckoutSessionId, CurrencyCode, PaymentStatus, format_amount};

use crate::api::CheckoutStatus;
use crate::error::ClientError;

const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);
const DEFAULT_MAX_ATTEMPTS: u32 = 8;

/// Where checkout status comes from.
pub trait StatusSource: Send + Sync {
    /// Fetch the current status of a checkout session.
    fn checkout_status(
        &self,
        session_id: &CheckoutSessionId,
    ) -> impl Future<Output = Result<CheckoutStatus, ClientError>> + Send;
}

/// Polling cadence and budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between two status queries.
    pub interval: Duration,
    /// Number of non-terminal answers tolerated before giving up.
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Result of a single polling step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStep {
    /// Not settled yet; wait one interval and poll again.
    Continue,
    /// The flow reached a terminal status.
    Finished(PaymentStatus),
}

/// How a payment confirmation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutcome {
    /// Checkout session that was confirmed; absent for a cancelled return.
    pub session_id: Option<CheckoutSessionId>,
    pub status: PaymentStatus,
    /// Non-terminal answers received.
    pub attempts: u32,
    /// Settled amount in major units, when the payment completed.
    pub settled_amount: Option<Decimal>,
}

impl PaymentOutcome {
    /// Outcome of a return URL that reported a cancelled checkout.
    #[must_use]
    pub const fn cancelled() -> Self {
        Self {
            session_id: None,
            status: PaymentStatus::Cancelled,
            attempts: 0,
            settled_amount: None,
        }
    }

    /// Message to show the user, including the amount once settled.
    #[must_use]
    pub fn confirmation_message(&self) -> String {
        match (self.status, self.settled_amount) {
            (PaymentStatus::Completed, Some(amount)) => format!(
                "{} Amount: {}{}",
                self.status.message(),
                format_amount(amount),
                CurrencyCode::default().symbol()
            ),
            (status, _) => status.message().to_string(),
        }
    }
}

/// State machine confirming one checkout session.
pub struct PaymentPoller<'a, S> {
    source: &'a S,
    session_id: CheckoutSessionId,
    policy: PollPolicy,
    attempts: u32,
    status: PaymentStatus,
    settled_amount: Option<Decimal>,
    status_tx: Option<&'a watch::Sender<Option<PaymentStatus>>>,
}

impl<'a, S: StatusSource> PaymentPoller<'a, S> {
    /// A poller in the `checking` state.
    #[must_use]
    pub const fn new(source: &'a S, session_id: CheckoutSessionId, policy: PollPolicy) -> Self {
        Self {
            source,
            session_id,
            policy,
            attempts: 0,
            status: PaymentStatus::Checking,
            settled_amount: None,
            status_tx: None,
        }
    }

    /// Publish every status change on `tx`.
    #[must_use]
    pub fn with_status_channel(mut self, tx: &'a watch::Sender<Option<PaymentStatus>>) -> Self {
        tx.send_replace(Some(self.status));
        self.status_tx = Some(tx);
        self
    }

    #[must_use]
    pub const fn status(&self) -> PaymentStatus {
        self.status
    }

    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Perform one status query and advance the state machine.
    ///
    /// A finished poller stays finished and makes no further calls.
    pub async fn poll_once(&mut self) -> PollStep {
        if self.status.is_terminal() {
            return PollStep::Finished(self.status);
        }
        if self.attempts >= self.policy.max_attempts {
            return self.finish(PaymentStatus::Timeout);
        }

        match self.source.checkout_status(&self.session_id).await {
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Payment status check failed");
                self.finish(PaymentStatus::Error)
            }
            Ok(status) if status.is_paid() => {
                self.settled_amount = status.amount_total.map(|amount| amount.to_major());
                self.finish(PaymentStatus::Completed)
            }
            Ok(status) if status.is_expired() => self.finish(PaymentStatus::Expired),
            Ok(status) => {
                self.attempts += 1;
                debug!(
                    session_id = %self.session_id,
                    attempt = self.attempts,
                    payment_status = %status.payment_status,
                    "Payment not settled yet"
                );
                if self.attempts >= self.policy.max_attempts {
                    self.finish(PaymentStatus::Timeout)
                } else {
                    self.set_status(PaymentStatus::Processing);
                    PollStep::Continue
                }
            }
        }
    }

    /// Drive the poller to a terminal status.
    ///
    /// Tripping `cancel` stops the sequence at its next suspension point and
    /// ends it as `cancelled`.
    pub async fn run(mut self, cancel: &CancellationToken) -> PaymentOutcome {
        loop {
            let step = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                step = self.poll_once() => Some(step),
            };

            match step {
                None => {
                    self.finish(PaymentStatus::Cancelled);
                    break;
                }
                Some(PollStep::Finished(_)) => break,
                Some(PollStep::Continue) => {}
            }

            let cancelled = tokio::select! {
                biased;
                () = cancel.cancelled() => true,
                () = tokio::time::sleep(self.policy.interval) => false,
            };
            if cancelled {
                self.finish(PaymentStatus::Cancelled);
                break;
            }
        }

        PaymentOutcome {
            session_id: Some(self.session_id),
            status: self.status,
            attempts: self.attempts,
            settled_amount: self.settled_amount,
        }
    }

    fn finish(&mut self, status: PaymentStatus) -> PollStep {
        self.set_status(status);
        info!(
            session_id = %self.session_id,
            status = %status,
            attempts = self.attempts,
            "Payment confirmation finished"
        );
        PollStep::Finished(status)
    }

    fn set_status(&mut self, status: PaymentStatus) {
        self.status = status;
        if let Some(tx) = self.status_tx {
            tx.send_replace(Some(status));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tradedesk_core::MinorUnits;

    use super::*;

    /// Scripted status source. Once the script runs out every answer is
    /// "unpaid / open".
    #[derive(Default)]
    pub(crate) struct ScriptedSource {
        script: Mutex<VecDeque<Result<CheckoutStatus, ClientError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        pub(crate) fn new(script: Vec<Result<CheckoutStatus, ClientError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl StatusSource for ScriptedSource {
        async fn checkout_status(
            &self,
            _session_id: &CheckoutSessionId,
        ) -> Result<CheckoutStatus, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(pending()))
        }
    }

    pub(crate) fn pending() -> CheckoutStatus {
        CheckoutStatus {
            payment_status: "unpaid".to_string(),
            status: "open".to_string(),
            amount_total: None,
        }
    }

    pub(crate) fn paid(amount: i64) -> CheckoutStatus {
        CheckoutStatus {
            payment_status: "paid".to_string(),
            status: "complete".to_string(),
            amount_total: Some(MinorUnits::new(amount)),
        }
    }

    fn expired() -> CheckoutStatus {
        CheckoutStatus {
            payment_status: "unpaid".to_string(),
            status: "expired".to_string(),
            amount_total: None,
        }
    }

    fn poller(source: &ScriptedSource) -> PaymentPoller<'_, ScriptedSource> {
        PaymentPoller::new(source, CheckoutSessionId::new("cs_test"), PollPolicy::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_pending_then_paid_completes() {
        let source = ScriptedSource::new(vec![
            Ok(pending()),
            Ok(pending()),
            Ok(pending()),
            Ok(paid(12_345)),
        ]);

        let started = tokio::time::Instant::now();
        let outcome = poller(&source).run(&CancellationToken::new()).await;

        assert_eq!(outcome.status, PaymentStatus::Completed);
        assert_eq!(source.calls(), 4);
        assert_eq!(outcome.attempts, 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(6000) && elapsed < Duration::from_millis(6100));
        assert_eq!(outcome.settled_amount, Some(Decimal::new(12_345, 2)));
        assert_eq!(
            outcome.confirmation_message(),
            "Payment successful! Amount: 123.45€"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhaustion_times_out_after_eight_calls() {
        let source = ScriptedSource::default();
        let outcome = poller(&source).run(&CancellationToken::new()).await;

        assert_eq!(outcome.status, PaymentStatus::Timeout);
        assert_eq!(source.calls(), 8);
        assert_eq!(outcome.attempts, 8);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_stops_after_one_call() {
        let source = ScriptedSource::new(vec![Ok(expired())]);
        let outcome = poller(&source).run(&CancellationToken::new()).await;

        assert_eq!(outcome.status, PaymentStatus::Expired);
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_error() {
        let source = ScriptedSource::new(vec![Ok(pending()), Err(ClientError::SessionExpired)]);
        let outcome = poller(&source).run(&CancellationToken::new()).await;

        assert_eq!(outcome.status, PaymentStatus::Error);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_state_is_sticky() {
        let source = ScriptedSource::new(vec![Ok(expired())]);
        let mut poller = poller(&source);

        assert_eq!(
            poller.poll_once().await,
            PollStep::Finished(PaymentStatus::Expired)
        );
        assert_eq!(
            poller.poll_once().await,
            PollStep::Finished(PaymentStatus::Expired)
        );
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_between_attempts() {
        let source = ScriptedSource::default();
        let cancel = CancellationToken::new();
        let (tx, rx) = watch::channel(None);
        let poller = poller(&source).with_status_channel(&tx);

        let (outcome, ()) = tokio::join!(poller.run(&cancel), async {
            tokio::time::sleep(Duration::from_millis(3000)).await;
            cancel.cancel();
        });

        assert_eq!(outcome.status, PaymentStatus::Cancelled);
        assert_eq!(source.calls(), 2);
        assert_eq!(*rx.borrow(), Some(PaymentStatus::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_precancelled_makes_no_call() {
        let source = ScriptedSource::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = poller(&source).run(&cancel).await;
        assert_eq!(outcome.status, PaymentStatus::Cancelled);
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_channel_tracks_progress() {
        let source = ScriptedSource::new(vec![Ok(pending())]);
        let (tx, rx) = watch::channel(None);
        let mut poller = poller(&source).with_status_channel(&tx);
        assert_eq!(*rx.borrow(), Some(PaymentStatus::Checking));

        assert_eq!(poller.poll_once().await, PollStep::Continue);
        assert_eq!(*rx.borrow(), Some(PaymentStatus::Processing));
    }
}
