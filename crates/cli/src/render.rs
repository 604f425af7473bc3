//! Plain-text tables for the terminal.
#![allow(clippy::print_stdout)]

use rust_decimal::Decimal;
use tradedesk_core::{
    Account, BannerSeverity, ClosedTrade, PaymentStatus, Position, Quote, SessionUser, Transaction,
    format_amount, total_profit_loss,
};

pub fn user(user: &SessionUser) {
    println!(
        "{} <{}> (id {})",
        user.profile.display_name(),
        user.profile.email,
        user.user_id
    );
}

pub fn quotes(quotes: &[Quote]) {
    println!("{:<10} {:>12} {:>12} {:>10}", "SYMBOL", "BID", "ASK", "SPREAD");
    for q in quotes {
        println!(
            "{:<10} {:>12.5} {:>12.5} {:>10}",
            q.symbol,
            q.bid,
            q.ask,
            q.spread.map_or_else(|| "-".to_string(), |s| format!("{s:.5}"))
        );
    }
}

pub fn account(account: &Account) {
    let symbol = account.currency.symbol();
    println!("Balance:     {}{symbol}", format_amount(account.balance));
    if let Some(equity) = account.equity {
        println!("Equity:      {}{symbol}", format_amount(equity));
    }
    if let Some(margin) = account.margin {
        println!("Margin:      {}{symbol}", format_amount(margin));
    }
    if let Some(free) = account.free_margin {
        println!("Free margin: {}{symbol}", format_amount(free));
    }
}

pub fn positions(positions: &[Position]) {
    if positions.is_empty() {
        println!("No open positions");
        return;
    }
    println!(
        "{:<14} {:<8} {:<5} {:>8} {:>6} {:>10} {:>10} {:>10}",
        "ID", "SYMBOL", "SIDE", "VOLUME", "LEV", "OPEN", "CURRENT", "P/L"
    );
    for p in positions {
        println!(
            "{:<14} {:<8} {:<5} {:>8.2} {:>6} {:>10.5} {:>10.5} {:>10}",
            p.position_id,
            p.symbol,
            p.order_type,
            p.volume,
            p.leverage.to_string(),
            p.open_price,
            p.current_price,
            signed(p.profit_loss)
        );
    }
    println!("Total P/L: {}", signed(total_profit_loss(positions)));
}

pub fn history(trades: &[ClosedTrade]) {
    if trades.is_empty() {
        println!("No closed trades");
        return;
    }
    for t in trades {
        println!(
            "{:<14} {:<8} {:<5} {:>8.2} {:>10} {}",
            t.position_id,
            t.symbol,
            t.order_type,
            t.volume,
            t.profit_loss.map_or_else(|| "-".to_string(), signed),
            t.close_reason.as_deref().unwrap_or("")
        );
    }
}

pub fn transactions(transactions: &[Transaction]) {
    if transactions.is_empty() {
        println!("No transactions");
        return;
    }
    for t in transactions {
        println!(
            "{:<25} {:<14} {:>12} {:?} {}",
            t.timestamp,
            t.transaction_id,
            signed(t.signed_amount()),
            t.status,
            t.description.as_deref().unwrap_or("")
        );
    }
}

/// Payment banner line, prefixed by its severity.
pub fn banner(status: PaymentStatus, message: &str) {
    let tag = match status.severity() {
        BannerSeverity::Success => "[ok]",
        BannerSeverity::Info => "[..]",
        BannerSeverity::Warning => "[!!]",
        BannerSeverity::Error => "[xx]",
    };
    println!("{tag} {message}");
}

pub fn line(message: &str) {
    println!("{message}");
}

fn signed(amount: Decimal) -> String {
    if amount.is_sign_negative() {
        format!("-{}", format_amount(-amount))
    } else {
        format!("+{}", format_amount(amount))
    }
}
