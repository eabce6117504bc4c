use crate::domain::policy::LendingPolicy;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

pub const DEFAULT_LOG_FILTER: &str = "biblend=info";

/// Application configuration, usually read from a JSON file.
///
/// Every field is optional in the file; missing ones take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub policy: LendingPolicy,
    /// `tracing_subscriber::EnvFilter` directive, used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            policy: LendingPolicy::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        let config: Self = serde_json::from_reader(source)?;
        config.policy.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LendingError;
    use rust_decimal_macros::dec;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_reader("{}".as_bytes()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.policy.max_active_loans, 5);
    }

    #[test]
    fn test_partial_policy_override() {
        let json = r#"{ "policy": { "daily_fine_rate": "0.25" }, "log_filter": "biblend=debug" }"#;
        let config = AppConfig::from_reader(json.as_bytes()).unwrap();
        assert_eq!(config.policy.daily_fine_rate.value(), dec!(0.25));
        assert_eq!(config.policy.max_active_loans, 5);
        assert_eq!(config.log_filter, "biblend=debug");
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let json = r#"{ "policy": { "max_active_loans": 0 } }"#;
        assert!(matches!(
            AppConfig::from_reader(json.as_bytes()),
            Err(LendingError::InvalidConfig(_))
        ));

        let json = r#"{ "policy": { "daily_fine_rate": "-2" } }"#;
        assert!(matches!(
            AppConfig::from_reader(json.as_bytes()),
            Err(LendingError::SerializationError(_))
        ));
    }
}
