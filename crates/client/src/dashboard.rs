//! Periodic refresh of the dashboard views.
//!
//! Each view is refreshed by its own task and published on its own `watch`
//! channel:
//!
//! | View           | Trigger                                  |
//! |----------------|------------------------------------------|
//! | quotes         | every 1 s                                |
//! | account        | every 5 s                                |
//! | positions      | every 2 s                                |
//! | history        | start, and whenever `positions` changes  |
//! | transactions   | start, and whenever `account` changes    |
//!
//! A failed refresh is logged and the previous value stays visible. Every
//! task stops when the [`DashboardHandle`] is shut down or dropped.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tradedesk_core::{Account, AccountType, ClosedTrade, Position, Quote, Transaction};

use crate::error::ClientError;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Command forcing an immediate refresh of every dependent view.
pub trait RefreshAll: Send + Sync {
    fn refresh_all(&self);
}

/// A [`RefreshAll`] that does nothing, for flows without a dashboard.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRefresh;

impl RefreshAll for NoRefresh {
    fn refresh_all(&self) {}
}

/// Where dashboard data comes from.
pub trait DashboardSource: Send + Sync + 'static {
    fn quotes(&self) -> impl Future<Output = Result<Vec<Quote>, ClientError>> + Send;

    fn account(
        &self,
        account: AccountType,
    ) -> impl Future<Output = Result<Account, ClientError>> + Send;

    fn positions(
        &self,
        account: AccountType,
    ) -> impl Future<Output = Result<Vec<Position>, ClientError>> + Send;

    fn history(
        &self,
        account: AccountType,
    ) -> impl Future<Output = Result<Vec<ClosedTrade>, ClientError>> + Send;

    fn transactions(
        &self,
        account: AccountType,
    ) -> impl Future<Output = Result<Vec<Transaction>, ClientError>> + Send;
}

/// Refresh periods of the timer-driven views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshIntervals {
    pub quotes: Duration,
    pub account: Duration,
    pub positions: Duration,
}

impl Default for RefreshIntervals {
    fn default() -> Self {
        Self {
            quotes: Duration::from_millis(1000),
            account: Duration::from_millis(5000),
            positions: Duration::from_millis(2000),
        }
    }
}

/// Latest value of every view. `None` until the first successful fetch.
#[derive(Debug, Clone)]
pub struct DashboardViews {
    pub quotes: watch::Receiver<Option<Vec<Quote>>>,
    pub account: watch::Receiver<Option<Account>>,
    pub positions: watch::Receiver<Option<Vec<Position>>>,
    pub history: watch::Receiver<Option<Vec<ClosedTrade>>>,
    pub transactions: watch::Receiver<Option<Vec<Transaction>>>,
}

/// Cloneable [`RefreshAll`] bound to one running dashboard.
#[derive(Debug, Clone)]
pub struct DashboardRefresher {
    tx: Arc<watch::Sender<u64>>,
}

impl RefreshAll for DashboardRefresher {
    fn refresh_all(&self) {
        debug!("Refreshing all dashboard views");
        self.tx.send_modify(|generation| *generation = generation.wrapping_add(1));
    }
}

/// Dashboard refresh scheduler for one account.
pub struct Dashboard<S> {
    source: Arc<S>,
    account: AccountType,
    intervals: RefreshIntervals,
}

impl<S: DashboardSource> Dashboard<S> {
    #[must_use]
    pub fn new(source: Arc<S>, account: AccountType) -> Self {
        Self {
            source,
            account,
            intervals: RefreshIntervals::default(),
        }
    }

    #[must_use]
    pub const fn with_intervals(mut self, intervals: RefreshIntervals) -> Self {
        self.intervals = intervals;
        self
    }

    /// Spawn every refresh task and return the handle that owns them.
    #[must_use]
    pub fn start(self) -> DashboardHandle {
        let cancel = CancellationToken::new();
        let (refresh_tx, refresh_rx) = watch::channel(0_u64);

        let (quotes_tx, quotes_rx) = watch::channel(None);
        let (account_tx, account_rx) = watch::channel(None);
        let (positions_tx, positions_rx) = watch::channel(None);
        let (history_tx, history_rx) = watch::channel(None);
        let (transactions_tx, transactions_rx) = watch::channel(None);

        let account = self.account;
        let handles = vec![
            {
                let source = Arc::clone(&self.source);
                spawn_periodic(
                    "quotes",
                    self.intervals.quotes,
                    quotes_tx,
                    refresh_rx.clone(),
                    cancel.clone(),
                    move || {
                        let source = Arc::clone(&source);
                        async move { source.quotes().await }
                    },
                )
            },
            spawn_reactive(
                "history",
                history_tx,
                positions_rx.clone(),
                refresh_rx.clone(),
                cancel.clone(),
                {
                    let source = Arc::clone(&self.source);
                    move || {
                        let source = Arc::clone(&source);
                        async move { source.history(account).await }
                    }
                },
            ),
            spawn_reactive(
                "transactions",
                transactions_tx,
                account_rx.clone(),
                refresh_rx.clone(),
                cancel.clone(),
                {
                    let source = Arc::clone(&self.source);
                    move || {
                        let source = Arc::clone(&source);
                        async move { source.transactions(account).await }
                    }
                },
            ),
            {
                let source = Arc::clone(&self.source);
                spawn_periodic(
                    "account",
                    self.intervals.account,
                    account_tx,
                    refresh_rx.clone(),
                    cancel.clone(),
                    move || {
                        let source = Arc::clone(&source);
                        async move { source.account(account).await }
                    },
                )
            },
            {
                let source = Arc::clone(&self.source);
                spawn_periodic(
                    "positions",
                    self.intervals.positions,
                    positions_tx,
                    refresh_rx,
                    cancel.clone(),
                    move || {
                        let source = Arc::clone(&source);
                        async move { source.positions(account).await }
                    },
                )
            },
        ];

        info!(account = %account, "Dashboard refresh started");

        DashboardHandle {
            views: DashboardViews {
                quotes: quotes_rx,
                account: account_rx,
                positions: positions_rx,
                history: history_rx,
                transactions: transactions_rx,
            },
            refresher: DashboardRefresher {
                tx: Arc::new(refresh_tx),
            },
            cancel,
            handles,
        }
    }
}

/// Owns the refresh tasks of a running dashboard.
///
/// Dropping the handle cancels every task; [`shutdown`](Self::shutdown) also
/// waits for them to finish.
pub struct DashboardHandle {
    views: DashboardViews,
    refresher: DashboardRefresher,
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl DashboardHandle {
    #[must_use]
    pub const fn views(&self) -> &DashboardViews {
        &self.views
    }

    /// A [`RefreshAll`] that can outlive borrows of the handle.
    #[must_use]
    pub fn refresher(&self) -> DashboardRefresher {
        self.refresher.clone()
    }

    /// Refresh every view now.
    pub fn refresh_all(&self) {
        self.refresher.refresh_all();
    }

    /// Stop every refresh task and wait for them to complete.
    pub async fn shutdown(mut self) {
        info!("Stopping dashboard refresh...");
        self.cancel.cancel();

        for (i, handle) in std::mem::take(&mut self.handles).into_iter().enumerate() {
            match tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await {
                Ok(Ok(())) => debug!(task = i, "Refresh task stopped"),
                Ok(Err(e)) => warn!(task = i, error = %e, "Refresh task panicked"),
                Err(_) => warn!(task = i, "Refresh task shutdown timeout"),
            }
        }
        info!("Dashboard refresh stopped");
    }
}

impl Drop for DashboardHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Store a fetched value, notifying subscribers only on an actual change.
fn publish<T: PartialEq>(view: &'static str, tx: &watch::Sender<Option<T>>, result: Result<T, ClientError>) {
    match result {
        Ok(value) => {
            let changed = tx.send_if_modified(|current| {
                if current.as_ref() == Some(&value) {
                    false
                } else {
                    *current = Some(value);
                    true
                }
            });
            if changed {
                debug!(view, "View updated");
            }
        }
        Err(ClientError::NotAuthenticated) => debug!(view, "Refresh skipped, not logged in"),
        Err(e) => warn!(view, error = %e, "Refresh failed, keeping previous data"),
    }
}

/// Fetch on a fixed period, and immediately on a refresh-all request.
fn spawn_periodic<T, F, Fut>(
    view: &'static str,
    period: Duration,
    tx: watch::Sender<Option<T>>,
    mut refresh_rx: watch::Receiver<u64>,
    cancel: CancellationToken,
    fetch: F,
) -> JoinHandle<()>
where
    T: PartialEq + Send + Sync + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                changed = refresh_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    ticker.reset();
                }
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = fetch() => publish(view, &tx, result),
            }
        }

        debug!(view, "Refresh task shutting down");
    })
}

/// Fetch once on start, then whenever `trigger` changes or a refresh-all is
/// requested.
fn spawn_reactive<T, U, F, Fut>(
    view: &'static str,
    tx: watch::Sender<Option<T>>,
    mut trigger: watch::Receiver<U>,
    mut refresh_rx: watch::Receiver<u64>,
    cancel: CancellationToken,
    fetch: F,
) -> JoinHandle<()>
where
    T: PartialEq + Send + Sync + 'static,
    U: Send + Sync + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = fetch() => publish(view, &tx, result),
            }

            let changed = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                changed = trigger.changed() => changed,
                changed = refresh_rx.changed() => changed,
            };
            if changed.is_err() {
                break;
            }
        }

        debug!(view, "Refresh task shutting down");
    })
}
