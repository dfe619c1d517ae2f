//! Binding for the deployed ATM (`Assessment`) contract.
//!
//! Reads go through `eth_call`, writes through `eth_sendTransaction` on the
//! injected provider, which signs with the connected account. A write returns
//! a [`PendingTx`]; [`AtmContract::wait`] polls for its receipt.

pub mod abi;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use abi::{Abi, Function, parse_quantity};
use alloy_primitives::U256;
use atm_provider::{Clock, Eip1193, ProviderError};
use atm_types::{Address, Amount, Balance, TxHash, TxKind};
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Hardhat artifact for the `Assessment` contract.
pub const ASSESSMENT_ARTIFACT: &str = include_str!("../abi/Assessment.json");

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ContractError {
    #[error("contract binding failed: {0}")]
    Binding(String),
    #[error("remote call failed: {0}")]
    RemoteCall(String),
    #[error("transaction was rejected in the wallet")]
    Rejected,
    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: TxHash },
    #[error("transaction {tx_hash} not confirmed after {waited:?}")]
    ConfirmationTimeout { tx_hash: TxHash, waited: Duration },
    #[error("amount {amount} does not fit in {ty}")]
    AmountOutOfRange { amount: U256, ty: String },
}

impl From<ProviderError> for ContractError {
    fn from(err: ProviderError) -> Self {
        if err.is_user_rejection() {
            ContractError::Rejected
        } else {
            ContractError::RemoteCall(err.message)
        }
    }
}

/// The provider plus the account it signs for.
#[derive(Clone)]
pub struct Signer<P> {
    pub provider: P,
    pub account: Address,
}

/// How long and how often to poll for a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(120),
        }
    }
}

/// A submitted, not yet confirmed state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTx {
    pub hash: TxHash,
    pub kind: TxKind,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub hash: TxHash,
    pub block_number: Option<u64>,
}

pub struct AtmContract<P> {
    address: Address,
    signer: Signer<P>,
    get_balance: Function,
    deposit: Function,
    withdraw: Function,
}

impl<P> AtmContract<P>
where
    P: Eip1193,
{
    /// Build the binding. Pure: no remote calls are made.
    pub fn create(
        address: Address,
        abi_json: &str,
        signer: Option<Signer<P>>,
    ) -> Result<Self, ContractError> {
        let signer = signer
            .ok_or_else(|| ContractError::Binding("no signer: connect a wallet first".to_owned()))?;
        let abi = Abi::parse(abi_json)?;

        Ok(Self {
            get_balance: abi.uint_function("getBalance", 0, 1)?,
            deposit: abi.uint_function("deposit", 1, 0)?,
            withdraw: abi.uint_function("withdraw", 1, 0)?,
            address,
            signer,
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn account(&self) -> &Address {
        &self.signer.account
    }

    pub async fn get_balance(&self) -> Result<Balance, ContractError> {
        let data = self.get_balance.encode_call(&[])?;
        let params = json!([
            { "from": self.signer.account, "to": self.address, "data": data },
            "latest"
        ]);
        let raw = self.signer.provider.request("eth_call", params).await?;
        let hex = raw
            .as_str()
            .ok_or_else(|| ContractError::RemoteCall(format!("eth_call returned {raw}")))?;
        let balance = abi::decode_uint(hex)?;
        debug!(%balance, "balance read");
        Ok(balance)
    }

    pub async fn deposit(&self, amount: Amount) -> Result<PendingTx, ContractError> {
        self.submit(TxKind::Deposit, amount).await
    }

    pub async fn withdraw(&self, amount: Amount) -> Result<PendingTx, ContractError> {
        self.submit(TxKind::Withdrawal, amount).await
    }

    pub async fn submit(&self, kind: TxKind, amount: Amount) -> Result<PendingTx, ContractError> {
        let function = match kind {
            TxKind::Deposit => &self.deposit,
            TxKind::Withdrawal => &self.withdraw,
        };
        let data = function.encode_call(&[amount])?;
        let params = json!([{ "from": self.signer.account, "to": self.address, "data": data }]);

        let raw = self
            .signer
            .provider
            .request("eth_sendTransaction", params)
            .await?;
        let hash = raw
            .as_str()
            .map(|h| TxHash(h.to_owned()))
            .ok_or_else(|| ContractError::RemoteCall(format!("eth_sendTransaction returned {raw}")))?;

        info!(%kind, %amount, tx_hash = %hash, "transaction submitted");
        Ok(PendingTx { hash, kind, amount })
    }

    /// Poll for the receipt of `pending` until it is mined or `policy.timeout`
    /// elapses. A mined receipt with status `0x0` is a revert.
    pub async fn wait<C: Clock>(
        &self,
        pending: &PendingTx,
        clock: &C,
        policy: &ConfirmationPolicy,
    ) -> Result<Receipt, ContractError> {
        let step = policy.poll_interval.max(Duration::from_millis(1));
        let mut waited = Duration::ZERO;

        loop {
            let raw = self
                .signer
                .provider
                .request("eth_getTransactionReceipt", json!([pending.hash.0]))
                .await?;

            if let Some(receipt) = parse_receipt(&pending.hash, &raw)? {
                info!(tx_hash = %pending.hash, block = ?receipt.block_number, "transaction confirmed");
                return Ok(receipt);
            }

            if waited >= policy.timeout {
                warn!(tx_hash = %pending.hash, ?waited, "gave up waiting for confirmation");
                return Err(ContractError::ConfirmationTimeout {
                    tx_hash: pending.hash.clone(),
                    waited,
                });
            }

            clock.sleep(step).await;
            waited += step;
        }
    }
}

fn parse_receipt(hash: &TxHash, raw: &Value) -> Result<Option<Receipt>, ContractError> {
    if raw.is_null() {
        return Ok(None);
    }

    let status = raw
        .get("status")
        .and_then(Value::as_str)
        .and_then(parse_quantity);
    if status == Some(0) {
        return Err(ContractError::Reverted {
            tx_hash: hash.clone(),
        });
    }

    let block_number = raw
        .get("blockNumber")
        .and_then(Value::as_str)
        .and_then(parse_quantity);

    Ok(Some(Receipt {
        hash: hash.clone(),
        block_number,
    }))
}
