//! Error taxonomy of the sync engine.

use thiserror::Error;

/// Failure of a single remote call, before any retry policy is applied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// HTTP 429
    #[error("Remote rate limit hit: {0}")]
    RateLimited(String),
    /// HTTP 5xx
    #[error("Remote server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },
    /// The supplied sync cursor is no longer accepted
    #[error("Sync cursor expired: {0}")]
    CursorExpired(String),
    /// HTTP 401
    #[error("Remote rejected credentials: {0}")]
    Unauthorized(String),
    /// Any other 4xx
    #[error("Remote rejected request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },
    /// Connection, TLS or timeout failure
    #[error("Remote request failed: {0}")]
    Transport(String),
    /// Response body could not be decoded
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
}

/// Reason the remote reports for a cursor it no longer accepts
pub const EXPIRED_SYNC_TOKEN: &str = "EXPIRED_SYNC_TOKEN";

impl RemoteError {
    /// Classify a non-success HTTP response
    pub fn from_response(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if status == 410 || message.contains(EXPIRED_SYNC_TOKEN) {
            return Self::CursorExpired(message);
        }
        match status {
            429 => Self::RateLimited(message),
            401 => Self::Unauthorized(message),
            500..=599 => Self::Server { status, message },
            _ => Self::Rejected { status, message },
        }
    }

    /// Whether the fetcher retries this failure with backoff
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Server { .. })
    }
}

/// A credential provider could not supply an access token
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct CredentialsError(pub String);

/// Errors surfaced by the sync engine to its callers
#[derive(Debug, Error)]
pub enum SyncError {
    /// Another sync holds the single-flight lock
    #[error("A sync is already in progress")]
    InProgress,

    /// Throttled on every attempt
    #[error("Remote rate limit still exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    /// 5xx on every attempt
    #[error("Remote server error after {attempts} attempts: {message}")]
    RemoteServer { attempts: u32, message: String },

    /// No usable access credential
    #[error("Credentials unavailable: {0}")]
    Credentials(#[from] CredentialsError),

    /// Non-retryable remote rejection
    #[error("Remote rejected request (HTTP {status}): {message}")]
    RemoteRejected { status: u16, message: String },

    /// Transport failure talking to the remote
    #[error("Remote request failed: {0}")]
    Transport(String),

    /// Remote answered with something we cannot read
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),

    /// Local store failure
    #[error(transparent)]
    Storage(#[from] crate::Error),
}

impl SyncError {
    /// Map a remote failure that will not be retried (further)
    pub fn from_remote(error: RemoteError, attempts: u32) -> Self {
        match error {
            RemoteError::RateLimited(_) => Self::RateLimitExceeded { attempts },
            RemoteError::Server { message, .. } => Self::RemoteServer { attempts, message },
            RemoteError::Unauthorized(message) => Self::Credentials(CredentialsError(format!(
                "remote rejected access token: {message}"
            ))),
            RemoteError::CursorExpired(message) => Self::RemoteRejected {
                status: 410,
                message,
            },
            RemoteError::Rejected { status, message } => Self::RemoteRejected { status, message },
            RemoteError::Transport(message) => Self::Transport(message),
            RemoteError::InvalidPayload(message) => Self::InvalidPayload(message),
        }
    }

    /// Whether the caller may simply try again later
    pub const fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::InProgress | Self::RateLimitExceeded { .. } | Self::RemoteServer { .. }
        )
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
