//! Tradedesk Client - talks to the trading backend on behalf of one user.
//!
//! # Architecture
//!
//! - [`session`] - Owns the bearer token and user identity, persists them, and
//!   mediates every outbound request (a `401` anywhere forces a logout)
//! - [`api`] - Typed wrappers over the backend's JSON endpoints
//! - [`payment`] - Redirect-based deposit confirmation: return-URL handling and
//!   the status polling state machine
//! - [`dashboard`] - Independent periodic refresh loops for quotes, account,
//!   positions, history and transactions
//! - [`validation`] - Client-side form checks that run before any network call
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tradedesk_client::{ClientConfig, SessionManager, TradingApi, session::FileStorage};
//!
//! let config = ClientConfig::from_env()?;
//! let storage = Arc::new(FileStorage::new(&config.session_dir));
//! let session = SessionManager::restore(&config, storage)?;
//!
//! let outcome = session.login("trader@example.com", &password).await;
//! let api = TradingApi::new(session.clone());
//! let positions = api.positions(config.account).await?;
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod payment;
pub mod session;
pub mod validation;

pub use api::TradingApi;
pub use config::{ClientConfig, ConfigError};
pub use dashboard::{Dashboard, DashboardHandle, DashboardSource, RefreshAll, RefreshIntervals};
pub use error::ClientError;
pub use payment::{
    Deposits, PaymentConfirmation, PaymentOutcome, PaymentPoller, PollPolicy, StatusSource,
};
pub use session::{AuthOutcome, RequestOptions, SessionManager};
pub use validation::ValidationErrors;
