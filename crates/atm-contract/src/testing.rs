//! In-process stand-in for an injected wallet talking to the ATM contract.
//!
//! Decodes call data with the same selectors the binding uses, so tests
//! exercise the real request shapes. State changes apply when the receipt
//! is first delivered, as they would when a block is mined.

use crate::abi::selector;
use alloy_primitives::{Selector, U256, hex};
use async_trait::async_trait;
use atm_provider::{Clock, Eip1193, ProviderError, USER_REJECTED};
use atm_types::Address;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

struct Submitted {
    selector: Selector,
    amount: U256,
    polls_left: Option<u32>,
    mined: bool,
}

struct ChainState {
    contract: Address,
    accounts: Vec<Address>,
    authorized: bool,
    reject_connect: bool,
    reject_next_tx: bool,
    fail_reads: bool,
    fail_sends: bool,
    revert_on_mine: bool,
    confirm_after_polls: Option<u32>,
    balance: U256,
    read_reply: Option<String>,
    nonce: u64,
    txs: HashMap<String, Submitted>,
    calls: Vec<String>,
}

/// Cheap to clone; clones share one chain.
#[derive(Clone)]
pub struct SimulatedChain {
    state: Rc<RefCell<ChainState>>,
}

impl SimulatedChain {
    pub fn new(contract: Address, account: Address) -> Self {
        Self {
            state: Rc::new(RefCell::new(ChainState {
                contract,
                accounts: vec![account],
                authorized: false,
                reject_connect: false,
                reject_next_tx: false,
                fail_reads: false,
                fail_sends: false,
                revert_on_mine: false,
                confirm_after_polls: Some(0),
                balance: U256::ZERO,
                read_reply: None,
                nonce: 0,
                txs: HashMap::new(),
                calls: Vec::new(),
            })),
        }
    }

    pub fn with_balance(self, balance: U256) -> Self {
        self.state.borrow_mut().balance = balance;
        self
    }

    /// The account is already authorized, so `eth_accounts` returns it.
    pub fn authorized(self) -> Self {
        self.state.borrow_mut().authorized = true;
        self
    }

    /// Receipts come back `null` for `polls` lookups before the tx is mined.
    pub fn confirm_after_polls(self, polls: u32) -> Self {
        self.state.borrow_mut().confirm_after_polls = Some(polls);
        self
    }

    pub fn never_confirm(self) -> Self {
        self.state.borrow_mut().confirm_after_polls = None;
        self
    }

    pub fn reject_connect(&self) {
        self.state.borrow_mut().reject_connect = true;
    }

    pub fn reject_next_transaction(&self) {
        self.state.borrow_mut().reject_next_tx = true;
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.borrow_mut().fail_reads = fail;
    }

    pub fn fail_sends(&self, fail: bool) {
        self.state.borrow_mut().fail_sends = fail;
    }

    pub fn revert_on_mine(&self, revert: bool) {
        self.state.borrow_mut().revert_on_mine = revert;
    }

    /// `eth_call` answers with `raw` verbatim from now on.
    pub fn reply_to_reads_with(&self, raw: impl Into<String>) {
        self.state.borrow_mut().read_reply = Some(raw.into());
    }

    pub fn balance(&self) -> U256 {
        self.state.borrow().balance
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    pub fn count_calls(&self, method: &str) -> usize {
        self.state
            .borrow()
            .calls
            .iter()
            .filter(|m| m.as_str() == method)
            .count()
    }

    fn eth_call(&self, params: &Value) -> Result<Value, ProviderError> {
        let state = self.state.borrow();
        if state.fail_reads {
            return Err(ProviderError::internal("network unreachable"));
        }
        if let Some(raw) = &state.read_reply {
            return Ok(json!(raw));
        }
        let (to, data) = call_target(params)?;
        if to != state.contract.as_str() {
            return Ok(json!("0x"));
        }
        if data.get(..4) != Some(selector("getBalance()").as_slice()) {
            return Err(ProviderError::internal("execution reverted"));
        }
        Ok(json!(hex::encode_prefixed(state.balance.to_be_bytes::<32>())))
    }

    fn send_transaction(&self, params: &Value) -> Result<Value, ProviderError> {
        let mut state = self.state.borrow_mut();
        if state.fail_sends {
            return Err(ProviderError::internal("network unreachable"));
        }
        if std::mem::take(&mut state.reject_next_tx) {
            return Err(ProviderError::new(USER_REJECTED, "User denied transaction signature."));
        }

        let (to, data) = call_target(params)?;
        if to != state.contract.as_str() || data.len() != 36 {
            return Err(ProviderError::internal("execution reverted"));
        }
        let sel = Selector::from_slice(&data[..4]);
        let amount = U256::from_be_slice(&data[4..]);

        // Gas estimation runs the call first, so overdrafts fail at submission.
        if sel == selector("withdraw(uint256)") && amount > state.balance {
            return Err(ProviderError::internal(format!(
                "execution reverted: InsufficientBalance({}, {amount})",
                state.balance
            )));
        }
        if sel != selector("deposit(uint256)") && sel != selector("withdraw(uint256)") {
            return Err(ProviderError::internal("execution reverted"));
        }

        state.nonce += 1;
        let hash = format!("0x{:064x}", state.nonce);
        let polls_left = state.confirm_after_polls;
        state.txs.insert(
            hash.clone(),
            Submitted {
                selector: sel,
                amount,
                polls_left,
                mined: false,
            },
        );
        Ok(json!(hash))
    }

    fn receipt(&self, params: &Value) -> Result<Value, ProviderError> {
        let mut state = self.state.borrow_mut();
        let hash = params
            .get(0)
            .and_then(Value::as_str)
            .ok_or_else(|| ProviderError::new(-32602, "missing tx hash"))?
            .to_owned();
        let revert = state.revert_on_mine;
        let mut delta: Option<(bool, U256)> = None;

        let Some(tx) = state.txs.get_mut(&hash) else {
            return Ok(Value::Null);
        };
        match tx.polls_left {
            None => return Ok(Value::Null),
            Some(n) if n > 0 => {
                tx.polls_left = Some(n - 1);
                return Ok(Value::Null);
            }
            Some(_) => {}
        }
        if !tx.mined {
            tx.mined = true;
            if !revert {
                delta = Some((tx.selector == selector("deposit(uint256)"), tx.amount));
            }
        }

        match delta {
            Some((true, amount)) => state.balance = state.balance.saturating_add(amount),
            Some((false, amount)) => state.balance = state.balance.saturating_sub(amount),
            None => {}
        }
        let nonce = state.nonce;
        Ok(json!({
            "transactionHash": hash,
            "status": if revert { "0x0" } else { "0x1" },
            "blockNumber": format!("0x{nonce:x}"),
        }))
    }
}

fn call_target(params: &Value) -> Result<(String, Vec<u8>), ProviderError> {
    let call = params
        .get(0)
        .ok_or_else(|| ProviderError::new(-32602, "missing call object"))?;
    let to = call
        .get("to")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_owned();
    let data = call.get("data").and_then(Value::as_str).unwrap_or("0x");
    let data = hex::decode(data).map_err(|err| ProviderError::new(-32602, err.to_string()))?;
    Ok((to, data))
}

#[async_trait(?Send)]
impl Eip1193 for SimulatedChain {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        self.state.borrow_mut().calls.push(method.to_owned());
        match method {
            "eth_accounts" => {
                let state = self.state.borrow();
                let accounts = if state.authorized { state.accounts.clone() } else { Vec::new() };
                Ok(json!(accounts))
            }
            "eth_requestAccounts" => {
                let mut state = self.state.borrow_mut();
                if state.reject_connect {
                    return Err(ProviderError::new(USER_REJECTED, "User rejected the request."));
                }
                state.authorized = true;
                Ok(json!(state.accounts))
            }
            "eth_call" => self.eth_call(&params),
            "eth_sendTransaction" => self.send_transaction(&params),
            "eth_getTransactionReceipt" => self.receipt(&params),
            other => Err(ProviderError::new(-32601, format!("method {other} not supported"))),
        }
    }
}

/// Clock whose sleeps only yield, with a fixed wall-clock reading.
pub struct InstantClock;

pub const INSTANT_CLOCK_TIME: &str = "2024-01-01T00:00:00.000Z";

#[async_trait(?Send)]
impl Clock for InstantClock {
    fn now_iso8601(&self) -> String {
        INSTANT_CLOCK_TIME.to_owned()
    }

    async fn sleep(&self, _duration: Duration) {
        YieldOnce(false).await
    }
}

/// Returns `Pending` once so concurrent futures on the same task interleave.
struct YieldOnce(bool);

impl std::future::Future for YieldOnce {
    type Output = ();

    fn poll(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<()> {
        if self.0 {
            std::task::Poll::Ready(())
        } else {
            self.0 = true;
            cx.waker().wake_by_ref();
            std::task::Poll::Pending
        }
    }
}
