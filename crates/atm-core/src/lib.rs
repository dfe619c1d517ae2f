//! Application core for the ATM client: configuration, the message-driven
//! view store, and the orchestrator that sequences wallet and contract calls.

pub mod app;
pub mod config;
pub mod store;

pub use app::{App, AppError, parse_amount};
pub use config::{AtmConfig, DEFAULT_CONTRACT_ADDRESS};
pub use store::{Dashboard, HistoryRow, Msg, Notice, NoticeLevel, OperationView, Store, TxPhase, View};
