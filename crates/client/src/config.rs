//! Client configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `TRADEDESK_API_URL` - Base URL of the trading backend (e.g. `https://api.example.com`)
//!
//! ## Optional
//! - `TRADEDESK_SESSION_DIR` - Directory holding the persisted session (default: `$HOME/.tradedesk`)
//! - `TRADEDESK_ACCOUNT` - Account to operate on, `demo` or `real` (default: demo)
//! - `TRADEDESK_REQUEST_TIMEOUT_SECS` - Per-request HTTP timeout (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tradedesk_core::AccountType;
use url::Url;

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const SESSION_DIR_NAME: &str = ".tradedesk";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Tradedesk client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the trading backend
    pub api_url: Url,
    /// Directory for the persisted session entries
    pub session_dir: PathBuf,
    /// Account the dashboard and order commands operate on
    pub account: AccountType,
    /// Timeout applied to every HTTP request
    pub request_timeout: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g. "production")
    pub sentry_environment: Option<String>,
}

impl ClientConfig {
    /// Configuration with defaults for everything but the backend URL.
    #[must_use]
    pub fn new(api_url: Url) -> Self {
        Self {
            api_url,
            session_dir: default_session_dir(),
            account: AccountType::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `TRADEDESK_API_URL` is missing or any variable
    /// fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let api_url = parse_api_url(&get_required_env("TRADEDESK_API_URL")?)?;
        let session_dir =
            get_optional_env("TRADEDESK_SESSION_DIR").map_or_else(default_session_dir, PathBuf::from);
        let account = get_env_or_default("TRADEDESK_ACCOUNT", "demo")
            .parse::<AccountType>()
            .map_err(|e| ConfigError::InvalidEnvVar("TRADEDESK_ACCOUNT".to_string(), e.to_string()))?;
        let timeout_secs = get_env_or_default(
            "TRADEDESK_REQUEST_TIMEOUT_SECS",
            &DEFAULT_REQUEST_TIMEOUT_SECS.to_string(),
        )
        .parse::<u64>()
        .map_err(|e| {
            ConfigError::InvalidEnvVar("TRADEDESK_REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
        })?;

        Ok(Self {
            api_url,
            session_dir,
            account,
            request_timeout: Duration::from_secs(timeout_secs),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }
}

/// Parse and check the backend base URL.
fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw)
        .map_err(|e| ConfigError::InvalidEnvVar("TRADEDESK_API_URL".to_string(), e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidEnvVar(
            "TRADEDESK_API_URL".to_string(),
            format!("unsupported scheme {}", url.scheme()),
        ));
    }

    Ok(url)
}

fn default_session_dir() -> PathBuf {
    get_optional_env("HOME").map_or_else(
        || PathBuf::from(SESSION_DIR_NAME),
        |home| PathBuf::from(home).join(SESSION_DIR_NAME),
    )
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_api_url_accepts_http() {
        let url = parse_api_url("http://localhost:8001").unwrap();
        assert_eq!(url.host_str(), Some("localhost"));
        assert!(parse_api_url("https://api.example.com/").is_ok());
    }

    #[test]
    fn test_parse_api_url_rejects_other_schemes() {
        assert!(matches!(
            parse_api_url("ftp://example.com"),
            Err(ConfigError::InvalidEnvVar(..))
        ));
        assert!(matches!(
            parse_api_url("not a url"),
            Err(ConfigError::InvalidEnvVar(..))
        ));
    }

    #[test]
    fn test_new_uses_defaults() {
        let config = ClientConfig::new(Url::parse("http://localhost:8001").unwrap());
        assert_eq!(config.account, AccountType::Demo);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.session_dir.ends_with(SESSION_DIR_NAME));
    }
}
