//! Sync run model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Status of a single sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncRunStatus {
    /// Finished successfully
    Idle,
    /// Currently running
    Syncing,
    /// Aborted with an error
    Error,
}

impl SyncRunStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncRunStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "syncing" => Ok(Self::Syncing),
            "error" => Ok(Self::Error),
            other => Err(Error::InvalidInput(format!("unknown sync status `{other}`"))),
        }
    }
}

/// How a run walks the remote collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStrategy {
    /// Every remote record, no cursor
    Full,
    /// Only changes since the stored cursor
    Incremental,
}

impl SyncStrategy {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Incremental => "incremental",
        }
    }
}

impl fmt::Display for SyncStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "incremental" => Ok(Self::Incremental),
            other => Err(Error::InvalidInput(format!(
                "unknown sync strategy `{other}`"
            ))),
        }
    }
}

/// One persisted synchronization attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRun {
    /// Row identifier (monotonic)
    pub id: i64,
    pub status: SyncRunStatus,
    pub strategy: SyncStrategy,
    /// Opaque remote cursor, written only once the final page is committed
    pub cursor: Option<String>,
    /// Failure detail for `Error` runs
    pub error: Option<String>,
    /// Start timestamp (Unix ms)
    pub started_at: i64,
    /// Completion timestamp (Unix ms), set on `Idle` or `Error`
    pub completed_at: Option<i64>,
}

impl SyncRun {
    #[must_use]
    pub fn has_cursor(&self) -> bool {
        self.cursor.as_deref().is_some_and(|cursor| !cursor.is_empty())
    }
}
