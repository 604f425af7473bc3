//! Deposits and withdrawals.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument};
use tradedesk_core::AccountType;
use url::Url;

use super::confirmation::REFRESH_DELAY;
use crate::api::{TradingApi, WithdrawalResponse};
use crate::dashboard::RefreshAll;
use crate::error::ClientError;
use crate::validation::{DepositDraft, WithdrawalDraft};

/// How a deposit is settled for an account type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositStrategy {
    /// Demo accounts: the backend credits the balance on the spot.
    InstantCredit,
    /// Real accounts: the user pays on the processor's hosted checkout page.
    HostedCheckout,
}

impl DepositStrategy {
    #[must_use]
    pub const fn for_account(account: AccountType) -> Self {
        match account {
            AccountType::Demo => Self::InstantCredit,
            AccountType::Real => Self::HostedCheckout,
        }
    }
}

/// What the front end should do after a deposit request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DepositOutcome {
    /// Funds are already on the account.
    Credited {
        amount: Decimal,
        message: Option<String>,
    },
    /// Send the user to the hosted checkout.
    Redirect { url: Url },
}

/// Deposit and withdrawal flows for the logged-in user.
#[derive(Clone)]
pub struct Deposits {
    api: TradingApi,
    refresher: Arc<dyn RefreshAll>,
}

impl Deposits {
    #[must_use]
    pub fn new(api: TradingApi, refresher: Arc<dyn RefreshAll>) -> Self {
        Self { api, refresher }
    }

    /// Validate and submit a deposit.
    ///
    /// Demo deposits schedule a refresh of dependent views shortly after the
    /// credit.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] before any request for a bad
    /// amount, the backend's rejection, or
    /// [`ClientError::UnexpectedResponse`] if a real-account checkout came
    /// back without a URL.
    #[instrument(skip(self, draft))]
    pub async fn deposit(
        &self,
        account: AccountType,
        draft: &DepositDraft,
    ) -> Result<DepositOutcome, ClientError> {
        let request = draft.validate(account)?;
        let response = self.api.create_checkout(&request).await?;

        match DepositStrategy::for_account(account) {
            DepositStrategy::InstantCredit => {
                info!(amount = %request.amount, "Demo deposit credited");
                let refresher = Arc::clone(&self.refresher);
                tokio::spawn(async move {
                    tokio::time::sleep(REFRESH_DELAY).await;
                    refresher.refresh_all();
                });
                Ok(DepositOutcome::Credited {
                    amount: request.amount,
                    message: response.message,
                })
            }
            DepositStrategy::HostedCheckout => {
                let raw = response.url.ok_or_else(|| {
                    ClientError::UnexpectedResponse("checkout session has no URL".to_string())
                })?;
                let url = Url::parse(&raw)?;
                info!(checkout_host = ?url.host_str(), "Redirecting to hosted checkout");
                Ok(DepositOutcome::Redirect { url })
            }
        }
    }

    /// Validate and submit a withdrawal, then refresh dependent views.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] before any request for a bad
    /// amount, or the backend's rejection (e.g. insufficient balance).
    #[instrument(skip(self, draft))]
    pub async fn withdraw(
        &self,
        account: AccountType,
        draft: &WithdrawalDraft,
    ) -> Result<WithdrawalResponse, ClientError> {
        let request = draft.validate(account)?;
        let result = self.api.withdraw(&request).await?;
        self.refresher.refresh_all();
        Ok(result)
    }
}
