//! Typed access to the trading backend.
//!
//! Every call goes through [`SessionManager::authorized_request`], so a `401`
//! on any endpoint ends the session. Non-success bodies become
//! [`ClientError::Api`] carrying the backend's `detail`.

pub mod types;

use std::future::Future;

use reqwest::Response;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};
use tradedesk_core::{
    Account, AccountType, CheckoutSessionId, ClosedTrade, PositionId, Position, Quote, Transaction,
};

pub use types::{
    AuthResponse, CheckoutRequest, CheckoutResponse, CheckoutStatus, CloseReceipt, OrderReceipt,
    OrderRequest, RegisterRequest, WithdrawalRequest, WithdrawalResponse,
};

use crate::dashboard::DashboardSource;
use crate::error::{ClientError, error_from_response};
use crate::payment::StatusSource;
use crate::session::{RequestOptions, SessionManager};
use crate::validation::OrderDraft;

/// Typed wrapper over the backend's JSON endpoints.
#[derive(Debug, Clone)]
pub struct TradingApi {
    session: SessionManager,
}

impl TradingApi {
    #[must_use]
    pub const fn new(session: SessionManager) -> Self {
        Self { session }
    }

    /// The session this API sends requests with.
    #[must_use]
    pub const fn session(&self) -> &SessionManager {
        &self.session
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Market data and account views
    // ─────────────────────────────────────────────────────────────────────────

    /// Live quotes for every listed symbol. Does not require a session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the body does not parse.
    #[instrument(skip(self))]
    pub async fn quotes(&self) -> Result<Vec<Quote>, ClientError> {
        let response = self
            .session
            .authorized_request("/api/prices", RequestOptions::get())
            .await?;
        decode(response, "Failed to fetch prices").await
    }

    /// Balance summary of one account.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] without a session, or an
    /// error if the request fails.
    #[instrument(skip(self))]
    pub async fn account(&self, account: AccountType) -> Result<Account, ClientError> {
        self.get_authed(&format!("/api/accounts/{account}"), "Failed to fetch account")
            .await
    }

    /// Open positions of one account.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] without a session, or an
    /// error if the request fails.
    #[instrument(skip(self))]
    pub async fn positions(&self, account: AccountType) -> Result<Vec<Position>, ClientError> {
        self.get_authed(&format!("/api/positions/{account}"), "Failed to fetch positions")
            .await
    }

    /// Closed trades of one account, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] without a session, or an
    /// error if the request fails.
    #[instrument(skip(self))]
    pub async fn history(&self, account: AccountType) -> Result<Vec<ClosedTrade>, ClientError> {
        self.get_authed(&format!("/api/history/{account}"), "Failed to fetch history")
            .await
    }

    /// Ledger of one account.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] without a session, or an
    /// error if the request fails.
    #[instrument(skip(self))]
    pub async fn transactions(
        &self,
        account: AccountType,
    ) -> Result<Vec<Transaction>, ClientError> {
        self.get_authed(
            &format!("/api/transactions/{account}"),
            "Failed to fetch transactions",
        )
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Orders
    // ─────────────────────────────────────────────────────────────────────────

    /// Validate and place a market order, stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] before any request if the draft is
    /// invalid, otherwise the backend's rejection.
    #[instrument(skip(self, draft), fields(symbol = %draft.symbol, side = %draft.side))]
    pub async fn place_order(
        &self,
        account: AccountType,
        draft: &OrderDraft,
    ) -> Result<OrderReceipt, ClientError> {
        let order = draft.validate(account, chrono::Utc::now().to_rfc3339())?;
        self.require_session()?;

        let response = self
            .session
            .authorized_request("/api/orders", RequestOptions::post().json(&order)?)
            .await?;
        let receipt: OrderReceipt = decode(response, "Failed to place order").await?;

        info!(position_id = ?receipt.position_id, "Order placed");
        Ok(receipt)
    }

    /// Close an open position at the current price.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] without a session, or the
    /// backend's rejection (e.g. unknown position).
    #[instrument(skip(self), fields(position_id = %position_id))]
    pub async fn close_position(&self, position_id: &PositionId) -> Result<CloseReceipt, ClientError> {
        self.require_session()?;

        let response = self
            .session
            .authorized_request(
                &format!("/api/positions/{position_id}"),
                RequestOptions::delete(),
            )
            .await?;
        let receipt: CloseReceipt = decode(response, "Failed to close position").await?;

        info!(close_price = ?receipt.close_price, "Position closed");
        Ok(receipt)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Payments
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a deposit. Real accounts get a hosted checkout URL back; demo
    /// accounts are credited by the backend immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] without a session, or the
    /// backend's rejection.
    #[instrument(skip(self), fields(account = %request.account_type, amount = %request.amount))]
    pub async fn create_checkout(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutResponse, ClientError> {
        self.require_session()?;

        let response = self
            .session
            .authorized_request(
                "/api/stripe/checkout/session",
                RequestOptions::post().json(request)?,
            )
            .await?;
        decode(response, "Failed to create checkout").await
    }

    /// Current state of a checkout session.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the session expired, or the
    /// body does not parse.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn checkout_status(
        &self,
        session_id: &CheckoutSessionId,
    ) -> Result<CheckoutStatus, ClientError> {
        let response = self
            .session
            .authorized_request(
                &format!("/api/stripe/checkout/status/{session_id}"),
                RequestOptions::get(),
            )
            .await?;
        let status: CheckoutStatus = decode(response, "Failed to check payment status").await?;

        debug!(
            payment_status = %status.payment_status,
            status = %status.status,
            "Checkout status"
        );
        Ok(status)
    }

    /// Withdraw funds from an account.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotAuthenticated`] without a session, or the
    /// backend's rejection (e.g. insufficient balance).
    #[instrument(skip(self), fields(account = %request.account_type, amount = %request.amount))]
    pub async fn withdraw(
        &self,
        request: &WithdrawalRequest,
    ) -> Result<WithdrawalResponse, ClientError> {
        self.require_session()?;

        let response = self
            .session
            .authorized_request("/api/stripe/withdrawal", RequestOptions::post().json(request)?)
            .await?;
        let result: WithdrawalResponse = decode(response, "Withdrawal failed").await?;

        info!(new_balance = %result.new_balance, "Withdrawal processed");
        Ok(result)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn require_session(&self) -> Result<(), ClientError> {
        if self.session.is_authenticated() {
            Ok(())
        } else {
            Err(ClientError::NotAuthenticated)
        }
    }

    async fn get_authed<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        fallback: &str,
    ) -> Result<T, ClientError> {
        self.require_session()?;
        let response = self
            .session
            .authorized_request(endpoint, RequestOptions::get())
            .await?;
        decode(response, fallback).await
    }
}

/// Decode a success body, or turn a failure body into [`ClientError::Api`].
async fn decode<T: DeserializeOwned>(response: Response, fallback: &str) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(error_from_response(response, fallback).await);
    }

    let bytes = response.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

impl StatusSource for TradingApi {
    fn checkout_status(
        &self,
        session_id: &CheckoutSessionId,
    ) -> impl Future<Output = Result<CheckoutStatus, ClientError>> + Send {
        Self::checkout_status(self, session_id)
    }
}

impl DashboardSource for TradingApi {
    fn quotes(&self) -> impl Future<Output = Result<Vec<Quote>, ClientError>> + Send {
        Self::quotes(self)
    }

    fn account(
        &self,
        account: AccountType,
    ) -> impl Future<Output = Result<Account, ClientError>> + Send {
        Self::account(self, account)
    }

    fn positions(
        &self,
        account: AccountType,
    ) -> impl Future<Output = Result<Vec<Position>, ClientError>> + Send {
        Self::positions(self, account)
    }

    fn history(
        &self,
        account: AccountType,
    ) -> impl Future<Output = Result<Vec<ClosedTrade>, ClientError>> + Send {
        Self::history(self, account)
    }

    fn transactions(
        &self,
        account: AccountType,
    ) -> impl Future<Output = Result<Vec<Transaction>, ClientError>> + Send {
        Self::transactions(self, account)
    }
}
