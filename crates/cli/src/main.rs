//! Tradedesk CLI - trade and manage funds from the terminal.
//!
//! # Usage
//!
//! ```bash
//! # Log in (password read from TRADEDESK_PASSWORD or the first line of stdin)
//! td login -e trader@example.com
//!
//! # Market data and account views
//! td prices
//! td --account real positions
//!
//! # Place a 0.1 lot sell order at 100x leverage
//! td order -s GBPUSD --side sell -v 0.1 -l 100
//!
//! # Deposit, then confirm the hosted checkout once redirected back
//! td --account real deposit 250
//! td confirm-payment "https://app.example.com/dashboard?session_id=cs_123&payment=success"
//!
//! # Live dashboard until Ctrl-C
//! td watch
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tradedesk_client::ClientConfig;
use tradedesk_core::{AccountType, Leverage, OrderSide};

mod commands;
mod error;
mod render;

use commands::Context;
use error::CliError;

#[derive(Parser)]
#[command(name = "td")]
#[command(author, version, about = "Tradedesk trading client")]
struct Cli {
    /// Account to operate on (`demo` or `real`); defaults to `TRADEDESK_ACCOUNT`
    #[arg(short, long, global = true)]
    account: Option<AccountType>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and persist the session
    Login {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Create an account and log in
    Register {
        /// Account email address
        #[arg(short, long)]
        email: String,

        /// First name
        #[arg(long)]
        first_name: String,

        /// Last name
        #[arg(long)]
        last_name: String,

        /// Phone number (digits, spaces and `-+()`)
        #[arg(long)]
        phone: Option<String>,
    },
    /// Log out and forget the persisted session
    Logout,
    /// Show the logged-in user
    Whoami,
    /// Show live quotes
    Prices,
    /// Show the account balance
    Account,
    /// Show open positions
    Positions,
    /// Close an open position
    Close {
        /// Position identifier
        position_id: String,
    },
    /// Show closed trades
    History,
    /// Show deposits and withdrawals
    Transactions,
    /// Place a market order
    Order {
        /// Instrument symbol
        #[arg(short, long, default_value = "EURUSD")]
        symbol: String,

        /// `buy` or `sell`
        #[arg(long, default_value = "buy")]
        side: OrderSide,

        /// Volume in lots
        #[arg(short, long, default_value_t = 0.01)]
        volume: f64,

        /// Leverage: 50, 100, 200, 500, 1000 or `unlimited`
        #[arg(short, long, default_value = "unlimited", value_parser = parse_leverage)]
        leverage: Leverage,
    },
    /// Deposit funds (demo: credited at once, real: hosted checkout)
    Deposit {
        /// Amount in account currency
        amount: String,
    },
    /// Withdraw funds
    Withdraw {
        /// Amount in account currency
        amount: String,

        /// Free-text reason
        #[arg(short, long, default_value = "")]
        description: String,
    },
    /// Confirm a deposit from the URL the payment page redirected to
    ConfirmPayment {
        /// Full return URL including its query string
        return_url: String,
    },
    /// Live dashboard until Ctrl-C
    Watch,
}

fn parse_leverage(s: &str) -> Result<Leverage, String> {
    if s.eq_ignore_ascii_case("unlimited") || s == "∞" {
        return Ok(Leverage::Unlimited);
    }
    let value: u32 = s
        .trim_end_matches(['x', '×'])
        .parse()
        .map_err(|_| format!("invalid leverage: {s}"))?;
    Ok(Leverage::from(value))
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ClientConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match ClientConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing_subscriber::fmt::init();
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(2);
        }
    };

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tradedesk_client=info,tradedesk_cli=info".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    if let Err(e) = run(cli, config).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: ClientConfig) -> Result<(), CliError> {
    let ctx = Context::new(config, cli.account)?;

    match cli.command {
        Commands::Login { email } => commands::auth::login(&ctx, &email).await,
        Commands::Register {
            email,
            first_name,
            last_name,
            phone,
        } => {
            commands::auth::register(&ctx, email, first_name, last_name, phone.unwrap_or_default())
                .await
        }
        Commands::Logout => {
            commands::auth::logout(&ctx).await;
            Ok(())
        }
        Commands::Whoami => {
            commands::auth::whoami(&ctx);
            Ok(())
        }
        Commands::Prices => commands::trading::prices(&ctx).await,
        Commands::Account => commands::trading::account(&ctx).await,
        Commands::Positions => commands::trading::positions(&ctx).await,
        Commands::Close { position_id } => commands::trading::close(&ctx, &position_id).await,
        Commands::History => commands::trading::history(&ctx).await,
        Commands::Transactions => commands::trading::transactions(&ctx).await,
        Commands::Order {
            symbol,
            side,
            volume,
            leverage,
        } => commands::trading::order(&ctx, symbol, side, volume, leverage).await,
        Commands::Deposit { amount } => commands::wallet::deposit(&ctx, amount).await,
        Commands::Withdraw {
            amount,
            description,
        } => commands::wallet::withdraw(&ctx, amount, description).await,
        Commands::ConfirmPayment { return_url } => {
            commands::wallet::confirm_payment(&ctx, &return_url).await
        }
        Commands::Watch => commands::watch::run(&ctx).await,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_leverage() {
        assert_eq!(parse_leverage("unlimited").unwrap(), Leverage::Unlimited);
        assert_eq!(parse_leverage("100").unwrap(), Leverage::Fixed(100));
        assert_eq!(parse_leverage("500x").unwrap(), Leverage::Fixed(500));
        assert!(parse_leverage("lots").is_err());
    }

    #[test]
    fn test_cli_parses_order() {
        let cli = Cli::try_parse_from([
            "td", "--account", "real", "order", "-s", "GBPUSD", "--side", "sell", "-v", "0.5", "-l",
            "200",
        ])
        .unwrap();
        assert_eq!(cli.account, Some(AccountType::Real));
        match cli.command {
            Commands::Order {
                symbol,
                side,
                leverage,
                ..
            } => {
                assert_eq!(symbol, "GBPUSD");
                assert_eq!(side, OrderSide::Sell);
                assert_eq!(leverage, Leverage::Fixed(200));
            }
            _ => panic!("expected order command"),
        }
    }

    #[test]
    fn test_cli_verify() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
