//! Confirming a deposit when the payment processor hands control back.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use tradedesk_core::PaymentStatus;
use url::Url;

use super::poller::{PaymentOutcome, PaymentPoller, PollPolicy, StatusSource};
use super::return_url::{ReturnAction, interpret, strip_payment_params};
use crate::dashboard::RefreshAll;

/// Delay between a settled payment and the refresh of dependent views.
pub const REFRESH_DELAY: Duration = Duration::from_millis(1000);

/// What a page load resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageLoad {
    /// URL to show from now on; payment parameters are stripped once the
    /// flow is cancelled or completed.
    pub url: Url,
    /// `None` when the URL was not a payment return.
    pub outcome: Option<PaymentOutcome>,
}

/// Drives payment confirmation for the redirect-based checkout.
///
/// Holds the banner status (subscribe with [`subscribe`](Self::subscribe))
/// and the cancellation token of the flow in progress.
pub struct PaymentConfirmation<S> {
    source: Arc<S>,
    refresher: Arc<dyn RefreshAll>,
    policy: PollPolicy,
    status_tx: watch::Sender<Option<PaymentStatus>>,
    cancel: Mutex<CancellationToken>,
}

impl<S: StatusSource> PaymentConfirmation<S> {
    #[must_use]
    pub fn new(source: Arc<S>, refresher: Arc<dyn RefreshAll>) -> Self {
        Self {
            source,
            refresher,
            policy: PollPolicy::default(),
            status_tx: watch::Sender::new(None),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    #[must_use]
    pub const fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Banner status updates. `None` means no payment flow.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<PaymentStatus>> {
        self.status_tx.subscribe()
    }

    /// Current banner status.
    #[must_use]
    pub fn status(&self) -> Option<PaymentStatus> {
        *self.status_tx.borrow()
    }

    /// Cancel the flow in progress. It ends as `cancelled` at its next
    /// suspension point, and its pending refresh is dropped.
    pub fn cancel(&self) {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
    }

    /// Inspect a page URL and run the payment flow it asks for.
    ///
    /// - `payment=success&session_id=..`: poll until a terminal status.
    /// - `payment=cancelled`: report `cancelled` without any request.
    /// - anything else: nothing happens.
    #[instrument(skip(self, url), fields(path = %url.path()))]
    pub async fn on_page_load(&self, url: &Url) -> PageLoad {
        match interpret(url) {
            ReturnAction::None => PageLoad {
                url: url.clone(),
                outcome: None,
            },
            ReturnAction::Cancelled => {
                self.fresh_token();
                info!("Checkout cancelled by the user");
                self.status_tx.send_replace(Some(PaymentStatus::Cancelled));
                PageLoad {
                    url: strip_payment_params(url),
                    outcome: Some(PaymentOutcome::cancelled()),
                }
            }
            ReturnAction::Confirm(session_id) => {
                let cancel = self.fresh_token();
                debug!(session_id = %session_id, "Confirming payment");

                let outcome = PaymentPoller::new(self.source.as_ref(), session_id, self.policy)
                    .with_status_channel(&self.status_tx)
                    .run(&cancel)
                    .await;

                let url = if outcome.status == PaymentStatus::Completed {
                    self.schedule_refresh(cancel);
                    strip_payment_params(url)
                } else {
                    url.clone()
                };

                PageLoad {
                    url,
                    outcome: Some(outcome),
                }
            }
        }
    }

    /// Replace the flow token, cancelling any flow still running.
    fn fresh_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let previous = std::mem::replace(
            &mut *self.cancel.lock().unwrap_or_else(PoisonError::into_inner),
            token.clone(),
        );
        previous.cancel();
        token
    }

    fn schedule_refresh(&self, cancel: CancellationToken) {
        let refresher = Arc::clone(&self.refresher);
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => debug!("Post-payment refresh cancelled"),
                () = tokio::time::sleep(REFRESH_DELAY) => refresher.refresh_all(),
            }
        });
    }
}
