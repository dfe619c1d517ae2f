use alloy_primitives::address;
use atm_contract::ConfirmationPolicy;
use atm_types::Address;
use std::time::Duration;
use tracing::Level;

/// Address the `Assessment` contract gets on a fresh local Hardhat node.
pub const DEFAULT_CONTRACT_ADDRESS: alloy_primitives::Address =
    address!("5FbDB2315678afecb367f032d93F642f64180aa3");

#[derive(Debug, Clone, PartialEq)]
pub struct AtmConfig {
    pub contract_address: Address,
    pub confirmation: ConfirmationPolicy,
    pub log_level: Level,
}

impl Default for AtmConfig {
    fn default() -> Self {
        Self {
            contract_address: DEFAULT_CONTRACT_ADDRESS.into(),
            confirmation: ConfirmationPolicy::default(),
            log_level: Level::INFO,
        }
    }
}

impl AtmConfig {
    /// Defaults overridden by page query parameters:
    /// `contract`, `pollMs`, `timeoutSecs`, `log`.
    ///
    /// Unknown keys are ignored. Invalid values keep the default and are
    /// reported back so the caller can log them once logging is up.
    pub fn from_query(query: &str) -> (Self, Vec<String>) {
        let mut config = Self::default();
        let mut warnings = Vec::new();

        for pair in query.trim_start_matches('?').split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key {
                "contract" => match value.parse::<Address>() {
                    Ok(addr) => config.contract_address = addr,
                    Err(err) => warnings.push(format!("ignoring contract={value}: {err}")),
                },
                "pollMs" => match value.parse::<u64>() {
                    Ok(ms) if ms > 0 => config.confirmation.poll_interval = Duration::from_millis(ms),
                    _ => warnings.push(format!("ignoring pollMs={value}: expected a positive integer")),
                },
                "timeoutSecs" => match value.parse::<u64>() {
                    Ok(secs) => config.confirmation.timeout = Duration::from_secs(secs),
                    Err(_) => warnings.push(format!("ignoring timeoutSecs={value}: expected an integer")),
                },
                "log" => match value.parse::<Level>() {
                    Ok(level) => config.log_level = level,
                    Err(_) => warnings.push(format!("ignoring log={value}: unknown level")),
                },
                _ => {}
            }
        }

        (config, warnings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_gives_defaults() {
        let (config, warnings) = AtmConfig::from_query("");
        assert_eq!(config, AtmConfig::default());
        assert!(warnings.is_empty());
        assert_eq!(
            config.contract_address.as_str(),
            "0x5fbdb2315678afecb367f032d93f642f64180aa3"
        );
    }

    #[test]
    fn query_overrides_apply() {
        let (config, warnings) = AtmConfig::from_query(
            "?contract=0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512&pollMs=250&timeoutSecs=30&log=debug&theme=dark",
        );
        assert!(warnings.is_empty());
        assert_eq!(
            config.contract_address.as_str(),
            "0xe7f1725e7734ce288f8367e1bb143e90bb3f0512"
        );
        assert_eq!(config.confirmation.poll_interval, Duration::from_millis(250));
        assert_eq!(config.confirmation.timeout, Duration::from_secs(30));
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn invalid_overrides_keep_defaults() {
        let (config, warnings) = AtmConfig::from_query("contract=0x12&pollMs=0&log=loud");
        assert_eq!(config, AtmConfig::default());
        assert_eq!(warnings.len(), 3);
    }
}
