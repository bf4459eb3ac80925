//! Database layer for Rolodex

mod connection;
mod contact_repository;
mod migrations;
mod sync_run_repository;

pub use connection::Database;
pub use contact_repository::{ContactRepository, LibSqlContactRepository, Upserted};
pub use sync_run_repository::{LibSqlSyncRunRepository, SyncRunRepository, SyncRunUpdate};
