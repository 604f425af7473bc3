//! CLI error type and Sentry user context.

use thiserror::Error;
use tradedesk_client::{ClientError, ValidationErrors};
use tradedesk_core::SessionUser;

/// Errors a command can end with.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("{0}")]
    AuthFailed(String),

    #[error("Not logged in; run `td login` first")]
    NotLoggedIn,

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to read password: {0}")]
    Io(#[from] std::io::Error),

    #[error("Password is required")]
    MissingPassword,
}

/// Attach the logged-in user to Sentry events.
pub fn set_sentry_user(user: &SessionUser) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user.user_id.to_string()),
            email: Some(user.profile.email.to_string()),
            ..Default::default()
        }));
    });
}

/// Clear user context from Sentry (call on logout).
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}
