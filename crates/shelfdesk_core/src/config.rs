//! Runtime configuration for core consumers.
//!
//! # Responsibility
//! - Resolve store location, logging and lending settings from environment.
//! - Reject malformed values instead of silently defaulting them.
//!
//! # Invariants
//! - Blank variables count as unset.
//! - `loan_period_days` is within `1..=MAX_LOAN_PERIOD_DAYS`.

use crate::logging::{LogLevel, LoggingError};
use crate::model::loan::DEFAULT_LOAN_PERIOD_DAYS;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "SHELFDESK_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "SHELFDESK_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "SHELFDESK_LOG_DIR";
pub const ENV_LOAN_PERIOD_DAYS: &str = "SHELFDESK_LOAN_PERIOD_DAYS";

const DEFAULT_DB_FILE_NAME: &str = "shelfdesk.sqlite3";
const MAX_LOAN_PERIOD_DAYS: u32 = 365;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidLoanPeriod(String),
    InvalidLogLevel(String),
    RelativeLogDir(PathBuf),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidLoanPeriod(raw) => write!(
                f,
                "{ENV_LOAN_PERIOD_DAYS} must be an integer in 1..={MAX_LOAN_PERIOD_DAYS}, got `{raw}`"
            ),
            Self::InvalidLogLevel(raw) => write!(
                f,
                "{ENV_LOG_LEVEL} must be one of trace|debug|info|warn|error, got `{raw}`"
            ),
            Self::RelativeLogDir(path) => write!(
                f,
                "{ENV_LOG_DIR} must be an absolute path, got `{}`",
                path.display()
            ),
        }
    }
}

impl Error for ConfigError {}

/// Settings shared by the API boundary and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: LogLevel,
    /// Logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub loan_period_days: u32,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            log_level: LogLevel::build_default(),
            log_dir: None,
            loan_period_days: DEFAULT_LOAN_PERIOD_DAYS,
        }
    }
}

impl CoreConfig {
    /// Resolves configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolves configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let mut config = Self::default();

        if let Some(path) = read(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(raw) = read(ENV_LOG_LEVEL) {
            config.log_level = raw
                .parse()
                .map_err(|_: LoggingError| ConfigError::InvalidLogLevel(raw))?;
        }
        if let Some(dir) = read(ENV_LOG_DIR) {
            let dir = PathBuf::from(dir);
            if !dir.is_absolute() {
                return Err(ConfigError::RelativeLogDir(dir));
            }
            config.log_dir = Some(dir);
        }
        if let Some(raw) = read(ENV_LOAN_PERIOD_DAYS) {
            config.loan_period_days = raw
                .parse::<u32>()
                .ok()
                .filter(|days| (1..=MAX_LOAN_PERIOD_DAYS).contains(days))
                .ok_or(ConfigError::InvalidLoanPeriod(raw))?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigError, CoreConfig, ENV_DB_PATH, ENV_LOAN_PERIOD_DAYS, ENV_LOG_DIR, ENV_LOG_LEVEL,
    };
    use crate::logging::LogLevel;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = CoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.loan_period_days, 14);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn blank_values_are_treated_as_unset() {
        let config = CoreConfig::from_lookup(lookup(&[(ENV_DB_PATH, "   ")])).unwrap();
        assert_eq!(config.db_path, CoreConfig::default().db_path);
    }

    #[test]
    fn overrides_are_applied() {
        let config = CoreConfig::from_lookup(lookup(&[
            (ENV_DB_PATH, "/var/lib/shelfdesk/library.db"),
            (ENV_LOAN_PERIOD_DAYS, "21"),
            (ENV_LOG_LEVEL, "Warning"),
        ]))
        .unwrap();
        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.db_path, PathBuf::from("/var/lib/shelfdesk/library.db"));
        assert_eq!(config.loan_period_days, 21);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let err = CoreConfig::from_lookup(lookup(&[(ENV_LOAN_PERIOD_DAYS, "0")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidLoanPeriod("0".to_string()));

        let err = CoreConfig::from_lookup(lookup(&[(ENV_LOG_LEVEL, "loud")])).unwrap_err();
        assert_eq!(err, ConfigError::InvalidLogLevel("loud".to_string()));

        let err = CoreConfig::from_lookup(lookup(&[(ENV_LOG_DIR, "logs")])).unwrap_err();
        assert_eq!(err, ConfigError::RelativeLogDir(PathBuf::from("logs")));
    }
}
