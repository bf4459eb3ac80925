//! Sync run (sync state) repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use crate::error::{Error, Result};
use crate::models::{SyncRun, SyncRunStatus, SyncStrategy};
use libsql::{params, Connection, Row};

const RUN_COLUMNS: &str = "id, status, strategy, cursor, error, started_at, completed_at";

/// Field changes applied by [`SyncRunRepository::update`]. `None` leaves a
/// field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncRunUpdate {
    pub status: Option<SyncRunStatus>,
    pub cursor: Option<String>,
    pub error: Option<String>,
}

impl SyncRunUpdate {
    /// Successful completion with the cursor of the final page
    pub fn completed(cursor: Option<String>) -> Self {
        Self {
            status: Some(SyncRunStatus::Idle),
            cursor,
            error: None,
        }
    }

    /// Aborted run with failure detail
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(SyncRunStatus::Error),
            cursor: None,
            error: Some(error.into()),
        }
    }
}

/// Trait for sync run storage operations (async)
#[allow(async_fn_in_trait)]
pub trait SyncRunRepository {
    /// Most recently started run
    async fn latest(&self) -> Result<Option<SyncRun>>;

    /// Open a new run
    async fn create(
        &self,
        status: SyncRunStatus,
        strategy: SyncStrategy,
        cursor: Option<&str>,
    ) -> Result<SyncRun>;

    /// Apply changes to a run. Reaching `Idle` or `Error` stamps `completed_at`.
    async fn update(&self, id: i64, changes: &SyncRunUpdate) -> Result<SyncRun>;

    /// Fetch a run by id
    async fn get(&self, id: i64) -> Result<Option<SyncRun>>;

    /// Newest runs first
    async fn list(&self, limit: usize) -> Result<Vec<SyncRun>>;

    /// Delete all but the newest `keep` runs (never fewer than one). Returns
    /// the number of deleted rows.
    async fn prune(&self, keep: usize) -> Result<usize>;
}

/// libSQL implementation of `SyncRunRepository`
pub struct LibSqlSyncRunRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlSyncRunRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_run(row: &Row) -> Result<SyncRun> {
        let status: String = row.get(1)?;
        let strategy: String = row.get(2)?;
        Ok(SyncRun {
            id: row.get(0)?,
            status: status.parse()?,
            strategy: strategy.parse()?,
            cursor: row.get::<Option<String>>(3)?,
            error: row.get::<Option<String>>(4)?,
            started_at: row.get(5)?,
            completed_at: row.get::<Option<i64>>(6)?,
        })
    }
}

impl SyncRunRepository for LibSqlSyncRunRepository<'_> {
    async fn latest(&self) -> Result<Option<SyncRun>> {
        Ok(self.list(1).await?.into_iter().next())
    }

    async fn create(
        &self,
        status: SyncRunStatus,
        strategy: SyncStrategy,
        cursor: Option<&str>,
    ) -> Result<SyncRun> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn
            .execute(
                "INSERT INTO sync_runs (status, strategy, cursor, started_at) VALUES (?, ?, ?, ?)",
                params![status.as_str(), strategy.as_str(), cursor, now],
            )
            .await?;
        let id = self.conn.last_insert_rowid();

        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("sync run {id}")))
    }

    async fn update(&self, id: i64, changes: &SyncRunUpdate) -> Result<SyncRun> {
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("sync run {id}")))?;

        let status = changes.status.unwrap_or(current.status);
        let cursor = changes.cursor.clone().or(current.cursor);
        let error = changes.error.clone().or(current.error);
        let completed_at = match status {
            SyncRunStatus::Syncing => current.completed_at,
            SyncRunStatus::Idle | SyncRunStatus::Error => {
                Some(chrono::Utc::now().timestamp_millis())
            }
        };

        self.conn
            .execute(
                "UPDATE sync_runs SET status = ?, cursor = ?, error = ?, completed_at = ? WHERE id = ?",
                params![status.as_str(), cursor, error, completed_at, id],
            )
            .await?;

        self.get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("sync run {id}")))
    }

    async fn get(&self, id: i64) -> Result<Option<SyncRun>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {RUN_COLUMNS} FROM sync_runs WHERE id = ?"),
                [id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_run(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, limit: usize) -> Result<Vec<SyncRun>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {RUN_COLUMNS} FROM sync_runs ORDER BY id DESC LIMIT ?"),
                [limit as i64],
            )
            .await?;

        let mut runs = Vec::new();
        while let Some(row) = rows.next().await? {
            runs.push(Self::parse_run(&row)?);
        }
        Ok(runs)
    }

    async fn prune(&self, keep: usize) -> Result<usize> {
        let keep = keep.max(1) as i64;
        let deleted = self
            .conn
            .execute(
                "DELETE FROM sync_runs
                 WHERE id NOT IN (SELECT id FROM sync_runs ORDER BY id DESC LIMIT ?)",
                [keep],
            )
            .await?;
        Ok(usize::try_from(deleted).unwrap_or(usize::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_latest_empty() {
        let db = setup().await;
        let repo = LibSqlSyncRunRepository::new(db.connection());
        assert!(repo.latest().await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_create_and_complete() {
        let db = setup().await;
        let repo = LibSqlSyncRunRepository::new(db.connection());

        let run = repo
            .create(SyncRunStatus::Syncing, SyncStrategy::Full, None)
            .await
            .unwrap();
        assert_eq!(run.status, SyncRunStatus::Syncing);
        assert!(run.completed_at.is_none());

        let done = repo
            .update(run.id, &SyncRunUpdate::completed(Some("tok-1".to_string())))
            .await
            .unwrap();
        assert_eq!(done.status, SyncRunStatus::Idle);
        assert_eq!(done.cursor.as_deref(), Some("tok-1"));
        assert!(done.completed_at.is_some());

        let latest = repo.latest().await.unwrap().unwrap();
        assert_eq!(latest, done);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_run_keeps_detail() {
        let db = setup().await;
        let repo = LibSqlSyncRunRepository::new(db.connection());

        let run = repo
            .create(SyncRunStatus::Syncing, SyncStrategy::Incremental, Some("old"))
            .await
            .unwrap();
        let failed = repo
            .update(run.id, &SyncRunUpdate::failed("remote down"))
            .await
            .unwrap();

        assert_eq!(failed.status, SyncRunStatus::Error);
        assert_eq!(failed.error.as_deref(), Some("remote down"));
        assert_eq!(failed.cursor.as_deref(), Some("old"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_missing_run() {
        let db = setup().await;
        let repo = LibSqlSyncRunRepository::new(db.connection());
        let err = repo
            .update(42, &SyncRunUpdate::completed(None))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_prune_keeps_newest() {
        let db = setup().await;
        let repo = LibSqlSyncRunRepository::new(db.connection());

        for _ in 0..5 {
            repo.create(SyncRunStatus::Idle, SyncStrategy::Full, None)
                .await
                .unwrap();
        }
        let newest = repo.latest().await.unwrap().unwrap();

        assert_eq!(repo.prune(2).await.unwrap(), 3);
        assert_eq!(repo.list(10).await.unwrap().len(), 2);

        assert_eq!(repo.prune(0).await.unwrap(), 1);
        assert_eq!(repo.latest().await.unwrap().unwrap().id, newest.id);
    }
}
