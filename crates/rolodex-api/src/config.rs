use std::collections::HashMap;
use std::env;

use rolodex_core::config::{value_or_default, ConfigError, RolodexConfig};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_DIRECTORY_TITLE: &str = "Contacts";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Title shown on the phone directory screens
    pub directory_title: String,
    pub core: RolodexConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "ROLODEX_API_BIND_ADDR", DEFAULT_BIND_ADDR);
        if bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::Invalid(
                "ROLODEX_API_BIND_ADDR must be a socket address such as 127.0.0.1:8080".to_string(),
            ));
        }

        let directory_title =
            value_or_default(&lookup, "ROLODEX_DIRECTORY_TITLE", DEFAULT_DIRECTORY_TITLE);

        Ok(Self {
            bind_addr,
            directory_title,
            core: RolodexConfig::from_lookup(&lookup)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn defaults_apply() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR);
        assert_eq!(config.directory_title, DEFAULT_DIRECTORY_TITLE);
        assert_eq!(config.core, RolodexConfig::default());
    }

    #[test]
    fn rejects_bad_bind_addr() {
        let err = config(&[("ROLODEX_API_BIND_ADDR", "localhost")]).unwrap_err();
        assert!(err.to_string().contains("ROLODEX_API_BIND_ADDR"));
    }

    #[test]
    fn core_errors_propagate() {
        let err = config(&[("ROLODEX_BATCH_SIZE", "0")]).unwrap_err();
        assert!(err.to_string().contains("ROLODEX_BATCH_SIZE"));
    }

    #[test]
    fn debug_redacts_access_token() {
        let config = config(&[("ROLODEX_ACCESS_TOKEN", "sensitive-token")]).unwrap();
        assert!(!format!("{config:?}").contains("sensitive-token"));
    }
}
