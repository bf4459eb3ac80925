//! Access credential seam. Token issuance and refresh live outside the engine.

use std::fmt;

use async_trait::async_trait;

use super::error::CredentialsError;
use crate::util::normalize_text_option;

/// Supplies a valid (possibly refreshed) bearer token for remote calls
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, CredentialsError>;
}

/// A fixed token, typically read from configuration
#[derive(Clone, Default)]
pub struct StaticCredentials {
    token: Option<String>,
}

impl StaticCredentials {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: normalize_text_option(token),
        }
    }

    pub const fn is_configured(&self) -> bool {
        self.token.is_some()
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("StaticCredentials")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

#[async_trait]
impl CredentialProvider for StaticCredentials {
    async fn access_token(&self) -> Result<String, CredentialsError> {
        self.token.clone().ok_or_else(|| {
            CredentialsError("no access token configured (set ROLODEX_ACCESS_TOKEN)".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_token_is_an_error() {
        let credentials = StaticCredentials::new(Some("   ".to_string()));
        assert!(!credentials.is_configured());
        assert!(credentials.access_token().await.is_err());
    }

    #[tokio::test]
    async fn returns_trimmed_token() {
        let credentials = StaticCredentials::new(Some(" secret ".to_string()));
        assert_eq!(credentials.access_token().await.unwrap(), "secret");
    }

    #[test]
    fn debug_redacts_token() {
        let credentials = StaticCredentials::new(Some("secret".to_string()));
        let debug = format!("{credentials:?}");
        assert!(!debug.contains("secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
