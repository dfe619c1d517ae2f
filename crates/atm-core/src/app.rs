//! Orchestrates wallet access, contract calls and store updates.
//!
//! `App` owns the session: the wallet adapter, the contract binding once
//! connected, and the [`Store`]. All writes go through [`App::dispatch`]; no
//! `RefCell` borrow is held across an `.await`.

use crate::config::AtmConfig;
use crate::store::{Msg, Notice, Store};
use atm_contract::{AtmContract, ContractError, Signer};
use atm_provider::{Clock, Eip1193, WalletAdapter, WalletError};
use atm_types::{Address, Amount, Balance, HistoryEntry, TxKind};
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AppError {
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    Contract(#[from] ContractError),
    #[error("connect a wallet first")]
    NotConnected,
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("a {0} is already in progress")]
    InFlight(TxKind),
}

type Listener = Box<dyn Fn(&Store)>;

pub struct App<P, C> {
    config: AtmConfig,
    abi_json: String,
    wallet: WalletAdapter<P>,
    contract: RefCell<Option<Rc<AtmContract<P>>>>,
    clock: C,
    store: RefCell<Store>,
    listener: RefCell<Option<Listener>>,
}

impl<P, C> App<P, C>
where
    P: Eip1193 + Clone,
    C: Clock,
{
    pub fn new(config: AtmConfig, abi_json: impl Into<String>, provider: Option<P>, clock: C) -> Self {
        Self {
            config,
            abi_json: abi_json.into(),
            wallet: WalletAdapter::new(provider),
            contract: RefCell::new(None),
            clock,
            store: RefCell::new(Store::default()),
            listener: RefCell::new(None),
        }
    }

    pub fn config(&self) -> &AtmConfig {
        &self.config
    }

    /// Called after every applied message. The listener must not dispatch.
    pub fn subscribe(&self, listener: impl Fn(&Store) + 'static) {
        *self.listener.borrow_mut() = Some(Box::new(listener));
    }

    pub fn dispatch(&self, msg: Msg) {
        self.store.borrow_mut().apply(msg);
        if let Some(listener) = self.listener.borrow().as_ref() {
            listener(&self.store.borrow());
        }
    }

    /// Run `f` with read access to the store.
    pub fn with_store<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Store) -> R,
    {
        f(&self.store.borrow())
    }

    /// Page-load sequence: detect the wallet and silently pick up an
    /// already-authorized account. Never prompts.
    pub async fn init(&self) {
        let detected = self.wallet.detect();
        self.dispatch(Msg::WalletDetected(detected));
        if !detected {
            warn!("no injected wallet provider found");
            return;
        }

        match self.wallet.list_accounts().await {
            Ok(accounts) => {
                if let Some(account) = accounts.into_iter().next() {
                    info!(%account, "found authorized account");
                    self.attach(account).await;
                }
            }
            Err(err) => warn!(%err, "could not list authorized accounts"),
        }
    }

    /// User-initiated connect: prompt for accounts and bind the contract.
    pub async fn connect(&self) -> Result<(), AppError> {
        if !self.wallet.detect() {
            self.dispatch(Msg::Notice(Notice::error(WalletError::NoWalletInstalled.to_string())));
            return Err(WalletError::NoWalletInstalled.into());
        }

        let accounts = match self.wallet.request_accounts().await {
            Ok(accounts) => accounts,
            Err(err) => {
                warn!(%err, "connect failed");
                self.dispatch(Msg::Notice(Notice::error(err.to_string())));
                return Err(err.into());
            }
        };

        let Some(account) = accounts.into_iter().next() else {
            info!("wallet returned no accounts");
            self.dispatch(Msg::Notice(Notice::error("No account found")));
            return Err(AppError::NotConnected);
        };

        self.bind(account.clone())?;
        self.dispatch(Msg::AccountConnected(account));
        if let Err(err) = self.refresh_balance().await {
            warn!(%err, "initial balance read failed");
        }
        Ok(())
    }

    /// Binds first so a failed bind leaves the connect button reachable.
    async fn attach(&self, account: Address) {
        if let Err(err) = self.bind(account.clone()) {
            warn!(%err, "contract binding failed");
            return;
        }
        self.dispatch(Msg::AccountConnected(account));
        if let Err(err) = self.refresh_balance().await {
            warn!(%err, "initial balance read failed");
        }
    }

    fn bind(&self, account: Address) -> Result<(), AppError> {
        let signer = self.wallet.provider().cloned().map(|provider| Signer {
            provider,
            account,
        });
        let contract = AtmContract::create(
            self.config.contract_address.clone(),
            &self.abi_json,
            signer,
        )
        .inspect_err(|err| {
            error!(%err, "contract binding failed");
            self.dispatch(Msg::Notice(Notice::error(err.to_string())));
        })?;

        info!(contract = %contract.address(), "contract bound");
        *self.contract.borrow_mut() = Some(Rc::new(contract));
        self.dispatch(Msg::ContractBound);
        Ok(())
    }

    fn contract(&self) -> Option<Rc<AtmContract<P>>> {
        self.contract.borrow().clone()
    }

    /// Read the balance and cache it. On failure the cached value stays.
    pub async fn refresh_balance(&self) -> Result<Balance, AppError> {
        let contract = self.contract().ok_or(AppError::NotConnected)?;
        match contract.get_balance().await {
            Ok(balance) => {
                self.dispatch(Msg::BalanceLoaded(balance));
                Ok(balance)
            }
            Err(err) => {
                warn!(%err, "balance read failed");
                Err(err.into())
            }
        }
    }

    pub fn set_input(&self, kind: TxKind, text: impl Into<String>) {
        self.dispatch(Msg::InputChanged(kind, text.into()));
    }

    pub async fn deposit(&self) -> Result<HistoryEntry, AppError> {
        self.submit(TxKind::Deposit).await
    }

    pub async fn withdraw(&self) -> Result<HistoryEntry, AppError> {
        self.submit(TxKind::Withdrawal).await
    }

    /// Submit the amount currently typed for `kind`, wait for confirmation,
    /// refresh the balance, then record the operation.
    pub async fn submit(&self, kind: TxKind) -> Result<HistoryEntry, AppError> {
        let contract = self.contract().ok_or(AppError::NotConnected)?;

        let (text, in_flight, cached) =
            self.with_store(|s| (s.input(kind).to_owned(), s.phase(kind).in_flight(), s.balance()));
        if in_flight {
            warn!(%kind, "submission rejected, one already in flight");
            self.dispatch(Msg::Notice(Notice::info(format!("A {kind} is already in progress"))));
            return Err(AppError::InFlight(kind));
        }
        let amount = match parse_amount(&text) {
            Ok(amount) => amount,
            Err(err) => {
                self.dispatch(Msg::Notice(Notice::error(err.to_string())));
                return Err(err);
            }
        };

        self.dispatch(Msg::Submitting(kind));
        match self.execute(&contract, kind, amount, cached).await {
            Ok(entry) => {
                info!(%kind, %amount, "operation recorded");
                self.dispatch(Msg::Confirmed(entry.clone()));
                Ok(entry)
            }
            Err(err) => {
                error!(%kind, %amount, %err, "operation failed");
                self.dispatch(Msg::Failed {
                    kind,
                    reason: err.to_string(),
                });
                Err(err.into())
            }
        }
    }

    async fn execute(
        &self,
        contract: &AtmContract<P>,
        kind: TxKind,
        amount: Amount,
        cached: Option<Balance>,
    ) -> Result<HistoryEntry, ContractError> {
        let before = match cached {
            Some(balance) => balance,
            None => contract.get_balance().await?,
        };

        let pending = contract.submit(kind, amount).await?;
        self.dispatch(Msg::AwaitingConfirmation(kind, pending.hash.clone()));
        contract
            .wait(&pending, &self.clock, &self.config.confirmation)
            .await?;

        // Funds have moved; a failed refresh only loses the fresh figure.
        let after = match contract.get_balance().await {
            Ok(balance) => {
                self.dispatch(Msg::BalanceLoaded(balance));
                Some(balance)
            }
            Err(err) => {
                warn!(%err, tx_hash = %pending.hash, "post-confirmation balance read failed");
                None
            }
        };

        Ok(HistoryEntry::record(
            kind,
            amount,
            before,
            after,
            self.clock.now_iso8601(),
        ))
    }

    pub fn clear_history(&self) {
        self.dispatch(Msg::HistoryCleared);
    }

    pub fn dismiss_notice(&self) {
        self.dispatch(Msg::DismissNotice);
    }
}

/// Positive base-10 integer up to `uint256::MAX`, surrounding whitespace
/// ignored. Zero is refused: it would record a deposit that changes nothing.
pub fn parse_amount(text: &str) -> Result<Amount, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::InvalidAmount("enter an amount".to_owned()));
    }
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::InvalidAmount(format!(
            "`{text}` is not a whole non-negative number"
        )));
    }
    let amount = Amount::from_str_radix(text, 10)
        .map_err(|_| AppError::InvalidAmount(format!("`{text}` does not fit in a uint256")))?;
    if amount.is_zero() {
        return Err(AppError::InvalidAmount("amount must be greater than zero".to_owned()));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{INSTALL_WALLET_MESSAGE, TxPhase, View};
    use alloy_primitives::U256;
    use atm_contract::ASSESSMENT_ARTIFACT;
    use atm_contract::testing::{INSTANT_CLOCK_TIME, InstantClock, SimulatedChain};
    use std::cell::Cell;
    use std::time::Duration;

    type TestApp = App<SimulatedChain, InstantClock>;

    fn alice() -> Address {
        "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266".parse().unwrap()
    }

    fn wei(n: u64) -> U256 {
        U256::from(n)
    }

    fn chain(balance: u64) -> SimulatedChain {
        SimulatedChain::new(AtmConfig::default().contract_address, alice())
            .with_balance(wei(balance))
    }

    fn app(chain: &SimulatedChain) -> TestApp {
        App::new(
            AtmConfig::default(),
            ASSESSMENT_ARTIFACT,
            Some(chain.clone()),
            InstantClock,
        )
    }

    async fn connected(chain: &SimulatedChain) -> anyhow::Result<TestApp> {
        let app = app(chain);
        app.init().await;
        app.connect().await?;
        Ok(app)
    }

    #[tokio::test]
    async fn deposit_scenario_updates_balance_and_history() -> anyhow::Result<()> {
        let chain = chain(100);
        let app = connected(&chain).await?;
        assert_eq!(app.with_store(|s| s.balance()), Some(wei(100)));

        app.set_input(TxKind::Deposit, "50");
        let entry = app.deposit().await?;

        assert_eq!(entry.kind, TxKind::Deposit);
        assert_eq!(entry.balance_change.to_string(), "50");
        assert_eq!(entry.balance_at_record_time, wei(100));
        assert_eq!(entry.balance_after, Some(wei(150)));
        assert_eq!(entry.timestamp, INSTANT_CLOCK_TIME);

        app.with_store(|s| {
            assert_eq!(s.balance(), Some(wei(150)));
            assert_eq!(s.history().entries(), [entry.clone()]);
            assert_eq!(s.input(TxKind::Deposit), "");
            assert_eq!(s.phase(TxKind::Deposit), &TxPhase::Confirmed);
        });
        Ok(())
    }

    #[tokio::test]
    async fn rejected_withdrawal_leaves_everything_unchanged() -> anyhow::Result<()> {
        let chain = chain(100);
        let app = connected(&chain).await?;
        app.set_input(TxKind::Withdrawal, "30");
        chain.fail_sends(true);

        let err = app.withdraw().await.unwrap_err();
        assert!(matches!(err, AppError::Contract(ContractError::RemoteCall(_))));

        app.with_store(|s| {
            assert_eq!(s.balance(), Some(wei(100)));
            assert!(s.history().is_empty());
            assert_eq!(s.input(TxKind::Withdrawal), "30");
            assert_eq!(s.phase(TxKind::Withdrawal), &TxPhase::Failed);
            assert!(s.notice().is_some());
        });
        Ok(())
    }

    #[tokio::test]
    async fn history_counts_only_successful_operations() -> anyhow::Result<()> {
        let chain = chain(100);
        let app = connected(&chain).await?;

        let steps = [
            (TxKind::Deposit, "10", true),
            (TxKind::Withdrawal, "500", false),
            (TxKind::Withdrawal, "20", true),
            (TxKind::Deposit, "abc", false),
            (TxKind::Deposit, "0", false),
            (TxKind::Deposit, "5", true),
        ];
        let mut succeeded = 0;
        for (kind, amount, ok) in steps {
            app.set_input(kind, amount);
            let result = app.submit(kind).await;
            assert_eq!(result.is_ok(), ok, "{kind} {amount}");
            if ok {
                succeeded += 1;
            }
        }

        app.with_store(|s| {
            assert_eq!(s.history().len(), succeeded);
            for entry in s.history().entries() {
                match entry.kind {
                    TxKind::Deposit => assert!(entry.balance_change.is_positive()),
                    TxKind::Withdrawal => assert!(entry.balance_change.is_negative()),
                }
            }
        });
        assert_eq!(chain.balance(), wei(95));
        Ok(())
    }

    #[tokio::test]
    async fn clear_history_empties_the_log() -> anyhow::Result<()> {
        let chain = chain(100);
        let app = connected(&chain).await?;
        for _ in 0..3 {
            app.set_input(TxKind::Deposit, "1");
            app.deposit().await?;
        }
        assert_eq!(app.with_store(|s| s.history().len()), 3);

        app.clear_history();
        assert!(app.with_store(|s| s.history().is_empty()));
        Ok(())
    }

    #[tokio::test]
    async fn missing_wallet_shows_install_prompt() {
        let app: TestApp = App::new(AtmConfig::default(), ASSESSMENT_ARTIFACT, None, InstantClock);
        app.init().await;

        assert_eq!(
            app.with_store(Store::view),
            View::InstallWallet {
                message: INSTALL_WALLET_MESSAGE
            }
        );
        assert_eq!(
            app.connect().await,
            Err(AppError::Wallet(WalletError::NoWalletInstalled))
        );
        assert_eq!(app.refresh_balance().await, Err(AppError::NotConnected));
    }

    #[tokio::test]
    async fn balance_reads_are_idempotent() -> anyhow::Result<()> {
        let chain = chain(42);
        let app = connected(&chain).await?;
        let first = app.refresh_balance().await?;
        let second = app.refresh_balance().await?;
        assert_eq!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn init_picks_up_authorized_account_without_prompting() -> anyhow::Result<()> {
        let chain = chain(7).authorized();
        let app = app(&chain);
        app.init().await;

        assert_eq!(chain.count_calls("eth_requestAccounts"), 0);
        app.with_store(|s| {
            assert_eq!(s.session().account, Some(alice()));
            assert!(s.session().contract_bound);
            assert_eq!(s.balance(), Some(wei(7)));
        });
        Ok(())
    }

    #[tokio::test]
    async fn init_without_authorization_waits_for_connect() {
        let chain = chain(7);
        let app = app(&chain);
        app.init().await;
        assert_eq!(app.with_store(Store::view), View::Connect { notice: None });
    }

    #[tokio::test]
    async fn rejected_connect_is_reported() {
        let chain = chain(7);
        chain.reject_connect();
        let app = app(&chain);
        app.init().await;

        assert_eq!(
            app.connect().await,
            Err(AppError::Wallet(WalletError::UserRejected))
        );
        let View::Connect { notice } = app.with_store(Store::view) else {
            panic!("expected connect view");
        };
        assert!(notice.is_some());
    }

    #[tokio::test]
    async fn invalid_amount_makes_no_remote_call() -> anyhow::Result<()> {
        let chain = chain(100);
        let app = connected(&chain).await?;
        for bad in ["", "0", "-5", "1.5", "ten", "1e3", "+5"] {
            app.set_input(TxKind::Deposit, bad);
            assert!(matches!(app.deposit().await, Err(AppError::InvalidAmount(_))));
        }
        assert_eq!(chain.count_calls("eth_sendTransaction"), 0);
        Ok(())
    }

    #[tokio::test]
    async fn second_submission_of_same_kind_is_rejected_while_pending() -> anyhow::Result<()> {
        let chain = chain(100).confirm_after_polls(3);
        let app = connected(&chain).await?;
        app.set_input(TxKind::Deposit, "10");

        let (first, second) = tokio::join!(app.deposit(), app.deposit());
        let rejected = [&first, &second]
            .into_iter()
            .filter(|r| **r == Err(AppError::InFlight(TxKind::Deposit)))
            .count();
        assert!(first.is_ok() || second.is_ok());
        assert_eq!(rejected, 1);
        assert_eq!(chain.count_calls("eth_sendTransaction"), 1);
        assert_eq!(app.with_store(|s| s.history().len()), 1);
        Ok(())
    }

    #[tokio::test]
    async fn unconfirmed_transaction_fails_after_timeout() -> anyhow::Result<()> {
        let chain = chain(100).never_confirm();
        let mut config = AtmConfig::default();
        config.confirmation.poll_interval = Duration::from_millis(100);
        config.confirmation.timeout = Duration::from_millis(300);
        let app = App::new(config, ASSESSMENT_ARTIFACT, Some(chain.clone()), InstantClock);
        app.init().await;
        app.connect().await?;

        app.set_input(TxKind::Deposit, "10");
        let err = app.deposit().await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Contract(ContractError::ConfirmationTimeout { .. })
        ));
        app.with_store(|s| {
            assert!(s.history().is_empty());
            assert_eq!(s.input(TxKind::Deposit), "10");
            assert!(!s.phase(TxKind::Deposit).in_flight());
        });
        Ok(())
    }

    #[tokio::test]
    async fn failed_refresh_after_confirmation_still_records() -> anyhow::Result<()> {
        let chain = chain(100);
        let app = connected(&chain).await?;
        app.set_input(TxKind::Deposit, "50");

        // Reads fail from here on, including the post-confirmation refresh.
        chain.fail_reads(true);
        let entry = app.deposit().await?;
        assert_eq!(entry.balance_after, None);
        assert_eq!(entry.new_balance(), wei(150));
        assert_eq!(app.with_store(|s| s.balance()), Some(wei(100)));
        Ok(())
    }

    #[tokio::test]
    async fn listener_sees_every_change() -> anyhow::Result<()> {
        let chain = chain(100);
        let app = connected(&chain).await?;
        let renders = Rc::new(Cell::new(0));
        let counter = renders.clone();
        app.subscribe(move |_| counter.set(counter.get() + 1));

        app.set_input(TxKind::Deposit, "1");
        app.deposit().await?;
        // input, submitting, awaiting, balance, confirmed
        assert_eq!(renders.get(), 5);
        Ok(())
    }

    #[tokio::test]
    async fn amounts_above_u64_reach_the_contract() -> anyhow::Result<()> {
        let chain = chain(100);
        let app = connected(&chain).await?;
        app.set_input(TxKind::Deposit, "18446744073709551616");

        let entry = app.deposit().await?;
        let expected = U256::from(u64::MAX) + wei(1);
        assert_eq!(entry.balance_change.unsigned_abs(), expected);
        assert_eq!(chain.count_calls("eth_sendTransaction"), 1);
        assert_eq!(chain.balance(), expected + wei(100));
        Ok(())
    }

    #[tokio::test]
    async fn zero_deposit_is_refused_before_submission() -> anyhow::Result<()> {
        let chain = chain(100);
        let app = connected(&chain).await?;
        app.set_input(TxKind::Deposit, "0");

        assert!(matches!(app.deposit().await, Err(AppError::InvalidAmount(_))));
        assert_eq!(chain.count_calls("eth_sendTransaction"), 0);
        app.with_store(|s| {
            assert!(s.history().is_empty());
            assert_eq!(s.input(TxKind::Deposit), "0");
            assert!(s.notice().is_some());
        });
        Ok(())
    }

    #[tokio::test]
    async fn failed_bind_on_init_keeps_connect_available() {
        let chain = chain(7).authorized();
        let app: TestApp = App::new(
            AtmConfig::default(),
            r#"{"abi": []}"#,
            Some(chain.clone()),
            InstantClock,
        );
        app.init().await;

        let View::Connect { notice } = app.with_store(Store::view) else {
            panic!("expected connect view");
        };
        assert!(notice.is_some());
        app.with_store(|s| {
            assert_eq!(s.session().account, None);
            assert!(!s.session().contract_bound);
        });
        assert_eq!(chain.count_calls("eth_call"), 0);
    }

    #[test]
    fn parses_amounts() {
        assert_eq!(parse_amount(" 50 "), Ok(wei(50)));
        assert_eq!(parse_amount(&U256::MAX.to_string()), Ok(U256::MAX));
        assert!(parse_amount("0").is_err());
        assert!(parse_amount("-1").is_err());
        assert!(parse_amount("").is_err());
    }

    #[test]
    fn oversized_amount_reports_width_not_syntax() {
        let too_big = format!("{}0", U256::MAX);
        let Err(AppError::InvalidAmount(reason)) = parse_amount(&too_big) else {
            panic!("expected invalid amount");
        };
        assert!(reason.contains("uint256"), "{reason}");
    }
}
