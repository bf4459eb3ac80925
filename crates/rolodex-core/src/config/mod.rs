//! Runtime configuration shared by the API server and the CLI.
//!
//! Values come from `ROLODEX_*` environment variables. Parsing goes through
//! [`RolodexConfig::from_lookup`] so tests never touch the process environment.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::sync::{RetryPolicy, SyncOptions, MAX_PAGE_SIZE};
use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_DB_PATH: &str = "rolodex.db";
pub const DEFAULT_REMOTE_API_URL: &str = "https://people.googleapis.com";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, PartialEq, Eq)]
pub struct RolodexConfig {
    pub db_path: PathBuf,
    pub access_token: Option<String>,
    pub remote_api_url: String,
    pub page_size: u32,
    pub batch_size: usize,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub page_delay: Duration,
    pub run_history: usize,
    pub default_country_code: Option<String>,
}

impl fmt::Debug for RolodexConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("RolodexConfig")
            .field("db_path", &self.db_path)
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("remote_api_url", &self.remote_api_url)
            .field("page_size", &self.page_size)
            .field("batch_size", &self.batch_size)
            .field("max_attempts", &self.max_attempts)
            .field("initial_backoff", &self.initial_backoff)
            .field("page_delay", &self.page_delay)
            .field("run_history", &self.run_history)
            .field("default_country_code", &self.default_country_code)
            .finish()
    }
}

impl Default for RolodexConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            access_token: None,
            remote_api_url: DEFAULT_REMOTE_API_URL.to_string(),
            page_size: MAX_PAGE_SIZE,
            batch_size: 100,
            max_attempts: 5,
            initial_backoff: Duration::from_millis(1_000),
            page_delay: Duration::from_millis(100),
            run_history: 20,
            default_country_code: None,
        }
    }
}

impl RolodexConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let db_path = PathBuf::from(value_or_default(&lookup, "ROLODEX_DB_PATH", DEFAULT_DB_PATH));
        let access_token = optional_trimmed(&lookup, "ROLODEX_ACCESS_TOKEN");

        let remote_api_url = value_or_default(&lookup, "ROLODEX_REMOTE_API_URL", DEFAULT_REMOTE_API_URL)
            .trim_end_matches('/')
            .to_string();
        if !is_http_url(&remote_api_url) {
            return Err(ConfigError::Invalid(
                "ROLODEX_REMOTE_API_URL must start with http:// or https://".to_string(),
            ));
        }

        let page_size = parse_ranged(&lookup, "ROLODEX_PAGE_SIZE", 1000_u32, 1, MAX_PAGE_SIZE)?;
        let batch_size = parse_ranged(&lookup, "ROLODEX_BATCH_SIZE", 100_usize, 1, 10_000)?;
        let max_attempts = parse_ranged(&lookup, "ROLODEX_MAX_ATTEMPTS", 5_u32, 1, 10)?;
        let initial_backoff_ms =
            parse_ranged(&lookup, "ROLODEX_INITIAL_BACKOFF_MS", 1_000_u64, 1, 60_000)?;
        let page_delay_ms = parse_ranged(&lookup, "ROLODEX_PAGE_DELAY_MS", 100_u64, 0, 10_000)?;
        let run_history = parse_ranged(&lookup, "ROLODEX_RUN_HISTORY", 20_usize, 1, 1_000)?;

        let default_country_code = optional_trimmed(&lookup, "ROLODEX_DEFAULT_COUNTRY_CODE")
            .map(|code| code.trim_start_matches('+').to_string());
        if let Some(code) = default_country_code.as_deref() {
            if code.is_empty() || code.len() > 3 || !code.chars().all(|c| c.is_ascii_digit()) {
                return Err(ConfigError::Invalid(
                    "ROLODEX_DEFAULT_COUNTRY_CODE must be 1-3 digits, e.g. 41 or +41".to_string(),
                ));
            }
        }

        Ok(Self {
            db_path,
            access_token,
            remote_api_url,
            page_size,
            batch_size,
            max_attempts,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            page_delay: Duration::from_millis(page_delay_ms),
            run_history,
            default_country_code,
        })
    }

    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.initial_backoff)
    }

    pub const fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            batch_size: self.batch_size,
            run_history: self.run_history,
        }
    }
}

/// Parse an integer variable and check it against an inclusive range
pub fn parse_ranged<T>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
    min: T,
    max: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + fmt::Display + Copy,
{
    let Some(raw) = optional_trimmed(lookup, name) else {
        return Ok(default);
    };
    let value = raw.parse::<T>().map_err(|_| {
        ConfigError::Invalid(format!("{name} must be an integer in [{min}, {max}]"))
    })?;
    if value < min || value > max {
        return Err(ConfigError::Invalid(format!("{name} must be in [{min}, {max}]")));
    }
    Ok(value)
}

pub fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

pub fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config(pairs: &[(&str, &str)]) -> Result<RolodexConfig, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        RolodexConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn defaults_apply_when_unset() {
        assert_eq!(config(&[]).unwrap(), RolodexConfig::default());
    }

    #[test]
    fn reads_overrides() {
        let config = config(&[
            ("ROLODEX_DB_PATH", "/tmp/contacts.db"),
            ("ROLODEX_ACCESS_TOKEN", " ya29.token "),
            ("ROLODEX_REMOTE_API_URL", "http://localhost:9000/"),
            ("ROLODEX_PAGE_SIZE", "250"),
            ("ROLODEX_BATCH_SIZE", "10"),
            ("ROLODEX_MAX_ATTEMPTS", "3"),
            ("ROLODEX_INITIAL_BACKOFF_MS", "50"),
            ("ROLODEX_PAGE_DELAY_MS", "0"),
            ("ROLODEX_RUN_HISTORY", "5"),
            ("ROLODEX_DEFAULT_COUNTRY_CODE", "+41"),
        ])
        .unwrap();

        assert_eq!(config.db_path, PathBuf::from("/tmp/contacts.db"));
        assert_eq!(config.access_token.as_deref(), Some("ya29.token"));
        assert_eq!(config.remote_api_url, "http://localhost:9000");
        assert_eq!(config.page_size, 250);
        assert_eq!(config.batch_size, 10);
        assert_eq!(
            config.retry_policy(),
            RetryPolicy::new(3, Duration::from_millis(50))
        );
        assert_eq!(config.page_delay, Duration::ZERO);
        assert_eq!(config.sync_options().run_history, 5);
        assert_eq!(config.default_country_code.as_deref(), Some("41"));
    }

    #[test]
    fn rejects_out_of_range_values() {
        let err = config(&[("ROLODEX_PAGE_SIZE", "5000")]).unwrap_err();
        assert!(err.to_string().contains("ROLODEX_PAGE_SIZE"));

        let err = config(&[("ROLODEX_MAX_ATTEMPTS", "many")]).unwrap_err();
        assert!(err.to_string().contains("integer"));

        assert!(config(&[("ROLODEX_RUN_HISTORY", "0")]).is_err());
        assert!(config(&[("ROLODEX_REMOTE_API_URL", "people.googleapis.com")]).is_err());
        assert!(config(&[("ROLODEX_DEFAULT_COUNTRY_CODE", "CH")]).is_err());
    }

    #[test]
    fn debug_redacts_access_token() {
        let config = config(&[("ROLODEX_ACCESS_TOKEN", "sensitive-token")]).unwrap();
        let debug_output = format!("{config:?}");
        assert!(!debug_output.contains("sensitive-token"));
        assert!(debug_output.contains("[REDACTED]"));
    }
}
