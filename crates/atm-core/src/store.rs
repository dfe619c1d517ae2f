//! Single-owner UI state.
//!
//! Every change is a [`Msg`] applied by [`Store::apply`]; async work posts
//! messages instead of touching fields. [`Store::view`] derives what the page
//! shows from the current state.

use atm_types::{Address, Balance, HistoryEntry, TxHash, TxKind};

pub const INSTALL_WALLET_MESSAGE: &str = "Please install Metamask in order to use this ATM.";

/// Lifecycle of one operation kind.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TxPhase {
    #[default]
    Idle,
    Submitting,
    AwaitingConfirmation(TxHash),
    Confirmed,
    Failed,
}

impl TxPhase {
    pub fn in_flight(&self) -> bool {
        matches!(self, TxPhase::Submitting | TxPhase::AwaitingConfirmation(_))
    }
}

/// One value per operation kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PerKind<T> {
    pub deposit: T,
    pub withdrawal: T,
}

impl<T> PerKind<T> {
    pub fn get(&self, kind: TxKind) -> &T {
        match kind {
            TxKind::Deposit => &self.deposit,
            TxKind::Withdrawal => &self.withdrawal,
        }
    }

    pub fn get_mut(&mut self, kind: TxKind) -> &mut T {
        match kind {
            TxKind::Deposit => &mut self.deposit,
            TxKind::Withdrawal => &mut self.withdrawal,
        }
    }
}

/// Append-only record of confirmed operations for this page session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryLog {
    entries: Vec<HistoryEntry>,
}

impl HistoryLog {
    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries = Vec::new();
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub wallet_detected: bool,
    pub account: Option<Address>,
    pub contract_bound: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Transient message shown above the controls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    WalletDetected(bool),
    AccountConnected(Address),
    ContractBound,
    BalanceLoaded(Balance),
    InputChanged(TxKind, String),
    Submitting(TxKind),
    AwaitingConfirmation(TxKind, TxHash),
    /// Clears the input for `entry.kind` and appends the entry.
    Confirmed(HistoryEntry),
    Failed { kind: TxKind, reason: String },
    HistoryCleared,
    Notice(Notice),
    DismissNotice,
}

#[derive(Debug, Clone, Default)]
pub struct Store {
    session: Session,
    balance: Option<Balance>,
    inputs: PerKind<String>,
    phases: PerKind<TxPhase>,
    history: HistoryLog,
    notice: Option<Notice>,
}

impl Store {
    pub fn apply(&mut self, msg: Msg) {
        match msg {
            Msg::WalletDetected(found) => self.session.wallet_detected = found,
            Msg::AccountConnected(account) => self.session.account = Some(account),
            Msg::ContractBound => self.session.contract_bound = true,
            Msg::BalanceLoaded(balance) => self.balance = Some(balance),
            Msg::InputChanged(kind, text) => *self.inputs.get_mut(kind) = text,
            Msg::Submitting(kind) => {
                *self.phases.get_mut(kind) = TxPhase::Submitting;
                self.notice = None;
            }
            Msg::AwaitingConfirmation(kind, hash) => {
                *self.phases.get_mut(kind) = TxPhase::AwaitingConfirmation(hash);
            }
            Msg::Confirmed(entry) => {
                *self.phases.get_mut(entry.kind) = TxPhase::Confirmed;
                self.inputs.get_mut(entry.kind).clear();
                self.history.append(entry);
            }
            Msg::Failed { kind, reason } => {
                *self.phases.get_mut(kind) = TxPhase::Failed;
                self.notice = Some(Notice::error(format!("{kind} failed: {reason}")));
            }
            Msg::HistoryCleared => self.history.clear(),
            Msg::Notice(notice) => self.notice = Some(notice),
            Msg::DismissNotice => self.notice = None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn balance(&self) -> Option<Balance> {
        self.balance
    }

    pub fn input(&self, kind: TxKind) -> &str {
        self.inputs.get(kind)
    }

    pub fn phase(&self, kind: TxKind) -> &TxPhase {
        self.phases.get(kind)
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn view(&self) -> View {
        if !self.session.wallet_detected {
            return View::InstallWallet {
                message: INSTALL_WALLET_MESSAGE,
            };
        }

        let Some(account) = &self.session.account else {
            return View::Connect {
                notice: self.notice.clone(),
            };
        };

        View::Dashboard(Dashboard {
            account: account.to_string(),
            balance: self.balance.map(|b| b.to_string()),
            deposit: self.operation_view(TxKind::Deposit),
            withdrawal: self.operation_view(TxKind::Withdrawal),
            history: self.history.entries().iter().map(HistoryRow::from).collect(),
            notice: self.notice.clone(),
        })
    }

    fn operation_view(&self, kind: TxKind) -> OperationView {
        let phase = self.phase(kind);
        let status = match phase {
            TxPhase::Idle => None,
            TxPhase::Submitting => Some("Waiting for wallet…".to_owned()),
            TxPhase::AwaitingConfirmation(hash) => Some(format!("Pending {hash}")),
            TxPhase::Confirmed => Some("Confirmed".to_owned()),
            TxPhase::Failed => Some("Failed".to_owned()),
        };
        OperationView {
            kind,
            input: self.input(kind).to_owned(),
            enabled: self.session.contract_bound && !phase.in_flight(),
            status,
        }
    }
}

/// What the page renders, derived from [`Store`].
#[derive(Debug, Clone, PartialEq)]
pub enum View {
    InstallWallet { message: &'static str },
    Connect { notice: Option<Notice> },
    Dashboard(Dashboard),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub account: String,
    pub balance: Option<String>,
    pub deposit: OperationView,
    pub withdrawal: OperationView,
    pub history: Vec<HistoryRow>,
    pub notice: Option<Notice>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationView {
    pub kind: TxKind,
    pub input: String,
    pub enabled: bool,
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRow {
    pub timestamp: String,
    pub kind: &'static str,
    pub change: String,
    pub new_balance: String,
}

impl From<&HistoryEntry> for HistoryRow {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            timestamp: entry.timestamp.clone(),
            kind: entry.kind.label(),
            change: entry.balance_change.to_string(),
            new_balance: entry.new_balance().to_string(),
        }
    }
}
