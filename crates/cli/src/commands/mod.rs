//! Command implementations.

pub mod auth;
pub mod trading;
pub mod wallet;
pub mod watch;

use std::io::BufRead;
use std::sync::Arc;

use secrecy::SecretString;
use tradedesk_client::session::FileStorage;
use tradedesk_client::{ClientConfig, SessionManager, TradingApi};
use tradedesk_core::AccountType;

use crate::error::CliError;

/// Environment variable checked for the password before prompting on stdin.
const PASSWORD_ENV: &str = "TRADEDESK_PASSWORD";

/// Shared state for one command invocation.
pub struct Context {
    pub config: ClientConfig,
    pub session: SessionManager,
    pub api: TradingApi,
    pub account: AccountType,
}

impl Context {
    /// Restore the persisted session and resolve the account to operate on.
    pub fn new(config: ClientConfig, account: Option<AccountType>) -> Result<Self, CliError> {
        let storage = Arc::new(FileStorage::new(&config.session_dir));
        let session = SessionManager::restore(&config, storage)?;
        let api = TradingApi::new(session.clone());
        let account = account.unwrap_or(config.account);

        if let Some(user) = session.user() {
            crate::error::set_sentry_user(&user);
        }

        Ok(Self {
            config,
            session,
            api,
            account,
        })
    }

    /// Fail early for commands that need a logged-in user.
    pub fn require_login(&self) -> Result<(), CliError> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            Err(CliError::NotLoggedIn)
        }
    }
}

/// Read a password from `TRADEDESK_PASSWORD`, or the first line of stdin.
pub fn read_password() -> Result<SecretString, CliError> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        return Ok(SecretString::from(password));
    }

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']);
    if password.is_empty() {
        return Err(CliError::MissingPassword);
    }
    Ok(SecretString::from(password.to_string()))
}
