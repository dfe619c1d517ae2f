//! Host boundary for the ATM client.
//!
//! Everything the browser supplies is reached through two traits:
//! [`Eip1193`] for the injected wallet provider and [`Clock`] for timers and
//! wall-clock time. The wallet and contract layers are written against these
//! so they run unchanged against `window.ethereum` or a simulated provider.

mod wallet;

pub use wallet::{WalletAdapter, WalletError};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::rc::Rc;
use std::time::Duration;
use thiserror::Error;

/// EIP-1193 code for "user rejected the request".
pub const USER_REJECTED: i64 = 4001;
/// JSON-RPC internal error, used for transport faults with no better code.
pub const INTERNAL_ERROR: i64 = -32603;

/// Error object returned by a provider `request` call.
#[derive(Debug, Clone, PartialEq, Error, Deserialize)]
#[error("provider error {code}: {message}")]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code == USER_REJECTED
    }
}

/// Injected-provider request/response transport.
///
/// Futures are `?Send`: the browser event loop is single-threaded and the JS
/// handles behind a real provider are not `Send`.
#[async_trait(?Send)]
pub trait Eip1193 {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;
}

#[async_trait(?Send)]
impl<T: Eip1193 + ?Sized> Eip1193 for Rc<T> {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        (**self).request(method, params).await
    }
}

/// Timers and wall-clock time.
#[async_trait(?Send)]
pub trait Clock {
    /// Current time as an ISO-8601 string (`2024-01-01T00:00:00.000Z`).
    fn now_iso8601(&self) -> String;

    async fn sleep(&self, duration: Duration);
}

#[async_trait(?Send)]
impl<T: Clock + ?Sized> Clock for Rc<T> {
    fn now_iso8601(&self) -> String {
        (**self).now_iso8601()
    }

    async fn sleep(&self, duration: Duration) {
        (**self).sleep(duration).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_parses_from_rpc_error_object() {
        let raw = serde_json::json!({
            "code": 4001,
            "message": "User rejected the request."
        });
        let err: ProviderError = serde_json::from_value(raw).unwrap();
        assert!(err.is_user_rejection());
        assert_eq!(err.to_string(), "provider error 4001: User rejected the request.");
    }

    #[test]
    fn internal_errors_are_not_rejections() {
        assert!(!ProviderError::internal("boom").is_user_rejection());
    }
}
