//! Live dashboard.

use std::sync::Arc;

use tracing::info;
use tradedesk_client::Dashboard;

use super::Context;
use crate::error::CliError;
use crate::render;

/// Print every view as it changes until Ctrl-C.
pub async fn run(ctx: &Context) -> Result<(), CliError> {
    ctx.require_login()?;

    let handle = Dashboard::new(Arc::new(ctx.api.clone()), ctx.account).start();
    let mut views = handle.views().clone();
    info!(account = %ctx.account, "Watching dashboard, press Ctrl-C to stop");

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => break,
            Ok(()) = views.account.changed() => {
                if let Some(account) = views.account.borrow_and_update().as_ref() {
                    render::account(account);
                }
            }
            Ok(()) = views.positions.changed() => {
                if let Some(positions) = views.positions.borrow_and_update().as_ref() {
                    render::positions(positions);
                }
            }
            Ok(()) = views.history.changed() => {
                if let Some(trades) = views.history.borrow_and_update().as_ref() {
                    render::history(trades);
                }
            }
            Ok(()) = views.transactions.changed() => {
                if let Some(transactions) = views.transactions.borrow_and_update().as_ref() {
                    render::transactions(transactions);
                }
            }
            Ok(()) = views.quotes.changed() => {
                if let Some(quotes) = views.quotes.borrow_and_update().as_ref() {
                    render::quotes(quotes);
                }
            }
            else => break,
        }
    }

    handle.shutdown().await;
    Ok(())
}
