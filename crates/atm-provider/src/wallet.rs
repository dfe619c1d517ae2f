use crate::{Eip1193, ProviderError};
use atm_types::Address;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WalletError {
    #[error("MetaMask wallet is required to connect")]
    NoWalletInstalled,
    #[error("account access was rejected in the wallet")]
    UserRejected,
    #[error("wallet returned an unexpected response: {0}")]
    MalformedResponse(String),
    #[error(transparent)]
    Provider(ProviderError),
}

impl From<ProviderError> for WalletError {
    fn from(err: ProviderError) -> Self {
        if err.is_user_rejection() {
            WalletError::UserRejected
        } else {
            WalletError::Provider(err)
        }
    }
}

/// Wraps the injected wallet provider, if the page has one.
pub struct WalletAdapter<P> {
    provider: Option<P>,
}

impl<P> WalletAdapter<P>
where
    P: Eip1193,
{
    pub fn new(provider: Option<P>) -> Self {
        Self { provider }
    }

    /// Whether an injected provider exists. No side effects.
    pub fn detect(&self) -> bool {
        self.provider.is_some()
    }

    pub fn provider(&self) -> Option<&P> {
        self.provider.as_ref()
    }

    /// Already-authorized accounts (`eth_accounts`). Never prompts; returns
    /// an empty list when no provider is present.
    pub async fn list_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let Some(provider) = &self.provider else {
            debug!("no injected provider, skipping eth_accounts");
            return Ok(Vec::new());
        };

        let raw = provider.request("eth_accounts", json!([])).await?;
        let accounts = parse_accounts(raw)?;
        if accounts.is_empty() {
            info!("no authorized account found");
        }
        Ok(accounts)
    }

    /// Prompt the user for account access (`eth_requestAccounts`).
    pub async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let Some(provider) = &self.provider else {
            return Err(WalletError::NoWalletInstalled);
        };

        let raw = provider.request("eth_requestAccounts", json!([])).await?;
        let accounts = parse_accounts(raw)?;
        if let Some(first) = accounts.first() {
            info!(account = %first, "account connected");
        }
        Ok(accounts)
    }
}

fn parse_accounts(raw: Value) -> Result<Vec<Address>, WalletError> {
    let items = match raw {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        other => return Err(WalletError::MalformedResponse(other.to_string())),
    };

    let mut accounts = Vec::with_capacity(items.len());
    for item in items {
        let Some(text) = item.as_str() else {
            warn!(%item, "skipping non-string account entry");
            continue;
        };
        match text.parse::<Address>() {
            Ok(addr) => accounts.push(addr),
            Err(err) => warn!(account = text, %err, "skipping malformed account"),
        }
    }
    Ok(accounts)
}
