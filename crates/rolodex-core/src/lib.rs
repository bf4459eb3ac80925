//! rolodex-core - Core library for Rolodex
//!
//! This crate contains the contact model, the libSQL store and the sync
//! engine that mirrors a remote address book into it. The API server and the
//! CLI are thin layers over [`DatabaseService`] and [`SyncEngine`].

pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod models;
pub mod phone;
pub mod search;
pub mod services;
pub mod sync;
pub mod util;

pub use config::{ConfigError, RolodexConfig};
pub use error::{Error, Result};
pub use models::{Contact, ContactId, SyncRun, SyncRunStatus, SyncStrategy};
pub use services::DatabaseService;
pub use sync::{SyncEngine, SyncError, SyncStatistics, SyncStatus};
