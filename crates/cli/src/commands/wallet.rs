//! Deposits, withdrawals and payment confirmation.

use std::sync::Arc;

use tracing::{info, warn};
use tradedesk_client::dashboard::NoRefresh;
use tradedesk_client::payment::DepositOutcome;
use tradedesk_client::validation::{DepositDraft, WithdrawalDraft};
use tradedesk_client::{Deposits, PaymentConfirmation};
use tradedesk_core::{CurrencyCode, format_amount};
use url::Url;

use super::Context;
use crate::error::CliError;
use crate::render;

fn deposits(ctx: &Context) -> Deposits {
    Deposits::new(ctx.api.clone(), Arc::new(NoRefresh))
}

pub async fn deposit(ctx: &Context, amount: String) -> Result<(), CliError> {
    ctx.require_login()?;
    let draft = DepositDraft { amount };

    match deposits(ctx).deposit(ctx.account, &draft).await? {
        DepositOutcome::Credited { amount, message } => {
            let fallback = format!(
                "Deposited {}{}",
                format_amount(amount),
                CurrencyCode::default().symbol()
            );
            render::line(message.as_deref().unwrap_or(&fallback));
        }
        DepositOutcome::Redirect { url } => {
            render::line("Complete the payment at:");
            render::line(url.as_str());
            render::line("then run `td confirm-payment <return url>`.");
        }
    }
    Ok(())
}

pub async fn withdraw(ctx: &Context, amount: String, description: String) -> Result<(), CliError> {
    ctx.require_login()?;
    let draft = WithdrawalDraft {
        amount,
        description,
    };

    let result = deposits(ctx).withdraw(ctx.account, &draft).await?;
    render::line(&result.message);
    render::line(&format!(
        "New balance: {}{}",
        format_amount(result.new_balance),
        CurrencyCode::default().symbol()
    ));
    Ok(())
}

/// Confirm a hosted-checkout deposit from the URL the processor returned to.
///
/// Ctrl-C cancels the confirmation; the flow then ends as `cancelled`.
pub async fn confirm_payment(ctx: &Context, return_url: &str) -> Result<(), CliError> {
    let url = Url::parse(return_url)?;
    let confirmation = PaymentConfirmation::new(Arc::new(ctx.api.clone()), Arc::new(NoRefresh));

    let mut status = confirmation.subscribe();
    let banner = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let current = *status.borrow_and_update();
            if let Some(s) = current.filter(|s| !s.is_terminal()) {
                render::banner(s, s.message());
            }
        }
    });

    let flow = confirmation.on_page_load(&url);
    tokio::pin!(flow);

    let load = tokio::select! {
        load = &mut flow => load,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, cancelling payment confirmation");
            confirmation.cancel();
            flow.await
        }
    };
    banner.abort();

    match load.outcome {
        Some(outcome) => {
            render::banner(outcome.status, &outcome.confirmation_message());
            if load.url != url {
                render::line(&format!("Continue at {}", load.url));
            }
        }
        None => {
            warn!("URL carries no payment result");
            render::line("Nothing to confirm");
        }
    }
    Ok(())
}
