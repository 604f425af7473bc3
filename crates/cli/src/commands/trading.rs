//! Market data, account views and order entry.

use tradedesk_client::validation::OrderDraft;
use tradedesk_core::{Leverage, OrderSide, PositionId, quote_for};

use super::Context;
use crate::error::CliError;
use crate::render;

pub async fn prices(ctx: &Context) -> Result<(), CliError> {
    let quotes = ctx.api.quotes().await?;
    render::quotes(&quotes);
    Ok(())
}

pub async fn account(ctx: &Context) -> Result<(), CliError> {
    ctx.require_login()?;
    let account = ctx.api.account(ctx.account).await?;
    render::account(&account);
    Ok(())
}

pub async fn positions(ctx: &Context) -> Result<(), CliError> {
    ctx.require_login()?;
    let positions = ctx.api.positions(ctx.account).await?;
    render::positions(&positions);
    Ok(())
}

pub async fn history(ctx: &Context) -> Result<(), CliError> {
    ctx.require_login()?;
    let trades = ctx.api.history(ctx.account).await?;
    render::history(&trades);
    Ok(())
}

pub async fn transactions(ctx: &Context) -> Result<(), CliError> {
    ctx.require_login()?;
    let transactions = ctx.api.transactions(ctx.account).await?;
    render::transactions(&transactions);
    Ok(())
}

pub async fn order(
    ctx: &Context,
    symbol: String,
    side: OrderSide,
    volume: f64,
    leverage: Leverage,
) -> Result<(), CliError> {
    ctx.require_login()?;
    let draft = OrderDraft {
        symbol,
        side,
        volume,
        leverage,
    };

    // Indicative only; the backend fills at its own price.
    if let Ok(quotes) = ctx.api.quotes().await {
        let quote = quote_for(&quotes, &draft.symbol.to_uppercase());
        render::line(&format!(
            "{} {} {} @ ~{:.5} ({leverage})",
            draft.side,
            draft.volume,
            quote.symbol,
            quote.price_for(draft.side)
        ));
    }

    let receipt = ctx.api.place_order(ctx.account, &draft).await?;
    match receipt.position_id {
        Some(id) => render::line(&format!("Order {}: position {id}", receipt.status)),
        None => render::line(&format!("Order {}", receipt.status)),
    }
    Ok(())
}

pub async fn close(ctx: &Context, position_id: &str) -> Result<(), CliError> {
    ctx.require_login()?;
    let receipt = ctx.api.close_position(&PositionId::new(position_id)).await?;
    match receipt.close_price {
        Some(price) => render::line(&format!("Position {position_id} {} at {price:.5}", receipt.status)),
        None => render::line(&format!("Position {position_id} {}", receipt.status)),
    }
    Ok(())
}
