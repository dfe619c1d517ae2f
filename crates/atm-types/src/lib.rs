use alloy_primitives::{I256, U256, hex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Amount entered for a single deposit or withdrawal.
pub type Amount = U256;

/// Contract-side balance, as returned by `getBalance()`.
pub type Balance = U256;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address must start with 0x: {0}")]
    MissingPrefix(String),
    #[error("address must be 20 bytes (40 hex chars), got {0} chars")]
    BadLength(usize),
    #[error("address contains non-hex characters: {0}")]
    NotHex(String),
}

/// 20-byte account or contract address, stored as lower-case `0x` hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) else {
            return Err(AddressError::MissingPrefix(raw.to_owned()));
        };
        if hex.len() != 40 {
            return Err(AddressError::BadLength(hex.len()));
        }
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AddressError::NotHex(raw.to_owned()));
        }
        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<alloy_primitives::Address> for Address {
    fn from(value: alloy_primitives::Address) -> Self {
        Self(hex::encode_prefixed(value))
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Hash of a submitted transaction, as returned by `eth_sendTransaction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TxKind {
    Deposit,
    Withdrawal,
}

impl TxKind {
    pub const ALL: [TxKind; 2] = [TxKind::Deposit, TxKind::Withdrawal];

    /// Signed balance delta for `amount`: positive for deposits, negative
    /// for withdrawals. Amounts above `I256::MAX` saturate.
    pub fn signed(self, amount: Amount) -> I256 {
        let magnitude = I256::try_from(amount).unwrap_or(I256::MAX);
        match self {
            TxKind::Deposit => magnitude,
            TxKind::Withdrawal => -magnitude,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TxKind::Deposit => "Deposit",
            TxKind::Withdrawal => "Withdrawal",
        }
    }
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One confirmed operation in the session history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// ISO-8601 wall-clock time at which the entry was recorded.
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: TxKind,
    pub balance_change: I256,
    /// Balance snapshot taken before the operation was applied.
    pub balance_at_record_time: Balance,
    /// Authoritative balance read after confirmation, when that read succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub balance_after: Option<Balance>,
}

impl HistoryEntry {
    pub fn record(
        kind: TxKind,
        amount: Amount,
        balance_before: Balance,
        balance_after: Option<Balance>,
        timestamp: String,
    ) -> Self {
        Self {
            timestamp,
            kind,
            balance_change: kind.signed(amount),
            balance_at_record_time: balance_before,
            balance_after,
        }
    }

    /// Balance shown next to the entry. Prefers the post-confirmation read
    /// and falls back to snapshot + delta.
    pub fn new_balance(&self) -> Balance {
        if let Some(after) = self.balance_after {
            return after;
        }
        let delta = self.balance_change.unsigned_abs();
        if self.balance_change.is_negative() {
            self.balance_at_record_time.saturating_sub(delta)
        } else {
            self.balance_at_record_time.saturating_add(delta)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    fn wei(n: u64) -> U256 {
        U256::from(n)
    }

    #[test]
    fn address_is_normalised_to_lower_case() {
        let addr: Address = CONTRACT.parse().unwrap();
        assert_eq!(addr.as_str(), "0x5fbdb2315678afecb367f032d93f642f64180aa3");
        assert_eq!(addr.to_string(), addr.as_str());

        let from_bytes = Address::from(address!("5FbDB2315678afecb367f032d93F642f64180aa3"));
        assert_eq!(from_bytes, addr);
    }

    #[test]
    fn address_rejects_malformed_input() {
        assert!(matches!(
            "5FbDB2315678afecb367f032d93F642f64180aa3".parse::<Address>(),
            Err(AddressError::MissingPrefix(_))
        ));
        assert_eq!("0x1234".parse::<Address>(), Err(AddressError::BadLength(4)));
        assert!(matches!(
            "0xZZbDB2315678afecb367f032d93F642f64180aa3".parse::<Address>(),
            Err(AddressError::NotHex(_))
        ));
    }

    #[test]
    fn balance_change_sign_follows_kind() {
        let deposit = HistoryEntry::record(TxKind::Deposit, wei(50), wei(100), None, "t".into());
        let withdrawal =
            HistoryEntry::record(TxKind::Withdrawal, wei(30), wei(150), None, "t".into());
        assert!(deposit.balance_change.is_positive());
        assert_eq!(deposit.balance_change.to_string(), "50");
        assert!(withdrawal.balance_change.is_negative());
        assert_eq!(withdrawal.balance_change.to_string(), "-30");
    }

    #[test]
    fn amounts_wider_than_u128_keep_their_value() {
        let amount = U256::from(u128::MAX) + wei(1);
        let entry = HistoryEntry::record(TxKind::Deposit, amount, wei(0), None, "t".into());
        assert_eq!(entry.balance_change.unsigned_abs(), amount);
        assert_eq!(entry.new_balance(), amount);
    }

    #[test]
    fn new_balance_prefers_post_refresh_read() {
        let stale = HistoryEntry::record(TxKind::Deposit, wei(50), wei(100), None, "t".into());
        assert_eq!(stale.new_balance(), wei(150));

        let fresh =
            HistoryEntry::record(TxKind::Deposit, wei(50), wei(100), Some(wei(175)), "t".into());
        assert_eq!(fresh.new_balance(), wei(175));

        let withdrawal =
            HistoryEntry::record(TxKind::Withdrawal, wei(20), wei(100), None, "t".into());
        assert_eq!(withdrawal.new_balance(), wei(80));
    }

    #[test]
    fn history_entry_serialises_with_camel_case_field_names() {
        let entry = HistoryEntry::record(
            TxKind::Withdrawal,
            wei(5),
            wei(20),
            None,
            "2024-01-01T00:00:00.000Z".into(),
        );
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "Withdrawal");
        assert_eq!(json["timestamp"], "2024-01-01T00:00:00.000Z");
        assert!(json.get("balanceChange").is_some());
        assert!(json.get("balanceAtRecordTime").is_some());
        assert!(json.get("balanceAfter").is_none());

        let back: HistoryEntry = serde_json::from_value(json).unwrap();
        assert_eq!(back, entry);
    }
}
