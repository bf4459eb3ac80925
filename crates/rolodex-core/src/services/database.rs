//! Shared database service wrapper used by the sync engine and read paths.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::db::{
    ContactRepository, Database, LibSqlContactRepository, LibSqlSyncRunRepository,
    SyncRunRepository,
};
use crate::models::{Contact, SyncRun};
use crate::Result;

/// Thread-safe service for DB and repository operations.
#[derive(Clone)]
pub struct DatabaseService {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl DatabaseService {
    /// Open a database service at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        tracing::debug!(path = %db_path.display(), "Opening contact store");
        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory database service (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Exclusive access for multi-statement work such as a commit batch.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().await
    }

    /// Active contacts ordered by display name.
    pub async fn list_contacts(&self, limit: usize, offset: usize) -> Result<Vec<Contact>> {
        let db = self.db.lock().await;
        let repo = LibSqlContactRepository::new(db.connection());
        repo.list(limit, offset).await
    }

    /// Search active contacts by name, organization or phone digits.
    pub async fn search_contacts(&self, query: &str, limit: usize) -> Result<Vec<Contact>> {
        let db = self.db.lock().await;
        let repo = LibSqlContactRepository::new(db.connection());
        repo.search(query, limit).await
    }

    /// Look up a contact by remote identifier. Soft-deleted rows are returned.
    pub async fn get_contact(&self, external_id: &str) -> Result<Option<Contact>> {
        let db = self.db.lock().await;
        let repo = LibSqlContactRepository::new(db.connection());
        repo.find_by_external_id(external_id).await
    }

    pub async fn count_active_contacts(&self) -> Result<usize> {
        let db = self.db.lock().await;
        LibSqlContactRepository::new(db.connection())
            .count_active()
            .await
    }

    pub async fn count_all_contacts(&self) -> Result<usize> {
        let db = self.db.lock().await;
        LibSqlContactRepository::new(db.connection())
            .count_total()
            .await
    }

    /// Most recently started sync run.
    pub async fn latest_run(&self) -> Result<Option<SyncRun>> {
        let db = self.db.lock().await;
        LibSqlSyncRunRepository::new(db.connection()).latest().await
    }

    /// Sync run history, newest first.
    pub async fn list_runs(&self, limit: usize) -> Result<Vec<SyncRun>> {
        let db = self.db.lock().await;
        LibSqlSyncRunRepository::new(db.connection())
            .list(limit)
            .await
    }
}
