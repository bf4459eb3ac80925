//! Sync orchestrator: strategy selection, run-state transitions, batching and
//! the single-flight guarantee.

use std::sync::Arc;

use serde::Serialize;

use super::credentials::{CredentialProvider, StaticCredentials};
use super::error::{SyncError, SyncResult};
use super::fetcher::{PageFetcher, PageResult};
use super::lock::{SyncLock, SyncLockGuard};
use super::reconciler::{RecordOutcome, Reconciler};
use super::remote::{ContactsApi, PeopleApiClient};
use super::stats::SyncStatistics;
use crate::config::RolodexConfig;
use crate::db::{LibSqlContactRepository, LibSqlSyncRunRepository, SyncRunRepository, SyncRunUpdate};
use crate::models::{SyncRunStatus, SyncStrategy};
use crate::phone::PhoneNormalizer;
use crate::services::DatabaseService;

const INTERRUPTED_DETAIL: &str = "interrupted before completion";
const EXPIRED_DETAIL: &str = "sync cursor expired; restarting as full sync";

/// Tunables of the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Records per committed transaction
    pub batch_size: usize,
    /// Sync runs kept after pruning
    pub run_history: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            run_history: 20,
        }
    }
}

/// Snapshot returned by [`SyncEngine::sync_status`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub status: SyncRunStatus,
    /// A run currently holds the single-flight lock
    pub in_progress: bool,
    pub strategy: Option<SyncStrategy>,
    /// Completion time of the latest run (Unix ms)
    pub last_run_at: Option<i64>,
    pub has_cursor: bool,
    pub last_error: Option<String>,
    pub local_active_count: usize,
    pub local_total_count: usize,
}

enum RunOutcome {
    Completed(SyncStatistics),
    Expired,
}

enum PagesOutcome {
    Completed { cursor: Option<String> },
    Expired,
}

/// Mirrors the remote contact list into the local store.
#[derive(Clone)]
pub struct SyncEngine {
    store: DatabaseService,
    fetcher: PageFetcher,
    reconciler: Reconciler,
    options: SyncOptions,
    lock: SyncLock,
}

impl SyncEngine {
    pub fn new(store: DatabaseService, fetcher: PageFetcher, reconciler: Reconciler) -> Self {
        Self {
            store,
            fetcher,
            reconciler,
            options: SyncOptions::default(),
            lock: SyncLock::new(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = SyncOptions {
            batch_size: options.batch_size.max(1),
            run_history: options.run_history.max(1),
        };
        self
    }

    /// Share a lock with other engines over the same store
    #[must_use]
    pub fn with_lock(mut self, lock: SyncLock) -> Self {
        self.lock = lock;
        self
    }

    /// Wire the People API client and a static token from configuration.
    pub fn from_config(store: DatabaseService, config: &RolodexConfig) -> SyncResult<Self> {
        let api: Arc<dyn ContactsApi> = Arc::new(
            PeopleApiClient::new(config.remote_api_url.clone())
                .map_err(|error| SyncError::from_remote(error, 0))?,
        );
        let credentials: Arc<dyn CredentialProvider> =
            Arc::new(StaticCredentials::new(config.access_token.clone()));
        Ok(Self::with_remote(store, api, credentials, config))
    }

    /// Same as [`Self::from_config`] with caller-supplied collaborators
    pub fn with_remote(
        store: DatabaseService,
        api: Arc<dyn ContactsApi>,
        credentials: Arc<dyn CredentialProvider>,
        config: &RolodexConfig,
    ) -> Self {
        let fetcher = PageFetcher::new(api, credentials)
            .with_retry(config.retry_policy())
            .with_page_size(config.page_size)
            .with_page_delay(config.page_delay);
        let reconciler = Reconciler::new(PhoneNormalizer::new(
            config.default_country_code.as_deref(),
        ));
        Self::new(store, fetcher, reconciler).with_options(config.sync_options())
    }

    pub const fn store(&self) -> &DatabaseService {
        &self.store
    }

    /// Mirror the whole remote list, ignoring any stored cursor
    pub async fn full_sync(&self) -> SyncResult<SyncStatistics> {
        let _guard = self.acquire()?;
        self.run_full().await
    }

    /// Apply changes since the stored cursor. Falls back to a full sync when
    /// there is no cursor or the remote no longer accepts it.
    pub async fn incremental_sync(&self) -> SyncResult<SyncStatistics> {
        let _guard = self.acquire()?;
        match self.stored_cursor().await? {
            Some(cursor) => self.run_incremental(cursor).await,
            None => {
                tracing::info!("No stored sync cursor, running full sync");
                self.run_full().await
            }
        }
    }

    /// Incremental when a cursor is stored, full otherwise
    pub async fn auto_sync(&self) -> SyncResult<SyncStatistics> {
        let _guard = self.acquire()?;
        match self.stored_cursor().await? {
            Some(cursor) => self.run_incremental(cursor).await,
            None => self.run_full().await,
        }
    }

    pub fn is_sync_in_progress(&self) -> bool {
        self.lock.is_held()
    }

    /// True when no stored cursor exists
    pub async fn needs_full_sync(&self) -> SyncResult<bool> {
        Ok(self.stored_cursor().await?.is_none())
    }

    pub async fn sync_status(&self) -> SyncResult<SyncStatus> {
        let latest = self.store.latest_run().await?;
        let local_active_count = self.store.count_active_contacts().await?;
        let local_total_count = self.store.count_all_contacts().await?;

        Ok(SyncStatus {
            status: latest.as_ref().map_or(SyncRunStatus::Idle, |run| run.status),
            in_progress: self.is_sync_in_progress(),
            strategy: latest.as_ref().map(|run| run.strategy),
            last_run_at: latest.as_ref().and_then(|run| run.completed_at),
            has_cursor: latest.as_ref().is_some_and(crate::models::SyncRun::has_cursor),
            last_error: latest.and_then(|run| run.error),
            local_active_count,
            local_total_count,
        })
    }

    fn acquire(&self) -> SyncResult<SyncLockGuard> {
        self.lock.try_acquire().ok_or_else(|| {
            tracing::info!("Rejecting sync request, another sync is running");
            SyncError::InProgress
        })
    }

    async fn stored_cursor(&self) -> SyncResult<Option<String>> {
        Ok(self
            .store
            .latest_run()
            .await?
            .filter(crate::models::SyncRun::has_cursor)
            .and_then(|run| run.cursor))
    }

    async fn run_full(&self) -> SyncResult<SyncStatistics> {
        match self.run(SyncStrategy::Full, None).await? {
            RunOutcome::Completed(stats) => Ok(stats),
            RunOutcome::Expired => Err(SyncError::RemoteRejected {
                status: 410,
                message: "remote reported an expired cursor for a full sync".to_string(),
            }),
        }
    }

    async fn run_incremental(&self, cursor: String) -> SyncResult<SyncStatistics> {
        match self.run(SyncStrategy::Incremental, Some(cursor)).await? {
            RunOutcome::Completed(stats) => Ok(stats),
            RunOutcome::Expired => {
                tracing::warn!("Sync cursor expired, falling back to full sync");
                self.run_full().await
            }
        }
    }

    /// One run record from `Syncing` to `Idle` or `Error`. Caller holds the lock.
    async fn run(&self, strategy: SyncStrategy, cursor: Option<String>) -> SyncResult<RunOutcome> {
        let run_id = self.open_run(strategy).await?;
        let mut stats = SyncStatistics::new(run_id, strategy);
        tracing::info!(run_id, strategy = %strategy, "Sync started");

        match self.sync_pages(cursor, &mut stats).await {
            Ok(PagesOutcome::Completed { cursor }) => {
                self.close_run(run_id, SyncRunUpdate::completed(cursor)).await?;
                stats.finish();
                tracing::info!(
                    run_id,
                    strategy = %strategy,
                    pages = stats.pages,
                    fetched = stats.fetched,
                    created = stats.created,
                    updated = stats.updated,
                    deleted = stats.deleted,
                    errors = stats.errors,
                    duration_ms = stats.duration_ms().unwrap_or_default(),
                    "Sync completed"
                );
                Ok(RunOutcome::Completed(stats))
            }
            Ok(PagesOutcome::Expired) => {
                self.close_run(run_id, SyncRunUpdate::failed(EXPIRED_DETAIL)).await?;
                Ok(RunOutcome::Expired)
            }
            Err(error) => {
                tracing::error!(run_id, strategy = %strategy, error = %error, "Sync failed");
                if let Err(close_error) =
                    self.close_run(run_id, SyncRunUpdate::failed(error.to_string())).await
                {
                    tracing::error!(run_id, error = %close_error, "Failed to record sync failure");
                }
                Err(error)
            }
        }
    }

    async fn open_run(&self, strategy: SyncStrategy) -> SyncResult<i64> {
        let db = self.store.lock().await;
        let runs = LibSqlSyncRunRepository::new(db.connection());

        if let Some(stale) = runs.latest().await? {
            if stale.status == SyncRunStatus::Syncing {
                tracing::warn!(run_id = stale.id, "Marking interrupted sync run as failed");
                runs.update(stale.id, &SyncRunUpdate::failed(INTERRUPTED_DETAIL))
                    .await?;
            }
        }

        Ok(runs.create(SyncRunStatus::Syncing, strategy, None).await?.id)
    }

    async fn close_run(&self, run_id: i64, update: SyncRunUpdate) -> SyncResult<()> {
        let db = self.store.lock().await;
        let runs = LibSqlSyncRunRepository::new(db.connection());
        runs.update(run_id, &update).await?;

        match runs.prune(self.options.run_history).await {
            Ok(0) => {}
            Ok(pruned) => tracing::debug!(pruned, "Pruned sync run history"),
            Err(error) => tracing::warn!(error = %error, "Failed to prune sync run history"),
        }
        Ok(())
    }

    async fn sync_pages(
        &self,
        cursor: Option<String>,
        stats: &mut SyncStatistics,
    ) -> SyncResult<PagesOutcome> {
        let mut pages = self.fetcher.pages(cursor);
        let mut final_cursor = None;

        while let Some(result) = pages.next_page().await? {
            let page = match result {
                PageResult::Data(page) => page,
                PageResult::Expired => return Ok(PagesOutcome::Expired),
            };

            stats.pages += 1;
            for batch in page.records.chunks(self.options.batch_size) {
                for outcome in self.apply_batch(batch).await? {
                    stats.record(outcome);
                }
            }
            if page.cursor.is_some() {
                final_cursor = page.cursor;
            }
        }

        Ok(PagesOutcome::Completed {
            cursor: final_cursor,
        })
    }

    /// Reconcile records inside one transaction
    async fn apply_batch(&self, records: &[serde_json::Value]) -> SyncResult<Vec<RecordOutcome>> {
        let db = self.store.lock().await;
        let repo = LibSqlContactRepository::new(db.connection());
        let mut outcomes = Vec::with_capacity(records.len());

        db.begin().await?;
        for record in records {
            match self.reconciler.apply(&repo, record).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(error) => {
                    db.rollback().await;
                    return Err(error.into());
                }
            }
        }
        db.commit().await?;

        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::error::RemoteError;
    use crate::sync::fake::{person_json, person_with_phone_json, tombstone_json, FakeContactsApi};
    use crate::sync::fetcher::RetryPolicy;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    async fn engine(api: &Arc<FakeContactsApi>) -> SyncEngine {
        let store = DatabaseService::open_in_memory().await.unwrap();
        let fetcher = PageFetcher::new(
            api.clone(),
            Arc::new(StaticCredentials::new(Some("token".to_string()))),
        )
        .with_retry(RetryPolicy::new(3, Duration::from_millis(1)))
        .with_page_delay(Duration::ZERO);
        SyncEngine::new(store, fetcher, Reconciler::default()).with_options(SyncOptions {
            batch_size: 2,
            run_history: 20,
        })
    }

    fn dataset() -> Vec<serde_json::Value> {
        vec![
            person_json("1", "Ada Lovelace"),
            person_with_phone_json("2", "Grace Hopper", "+1 415 555 0100"),
            person_json("3", "Alan Turing"),
        ]
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn full_sync_three_records_two_pages() {
        let api = Arc::new(FakeContactsApi::new());
        let records = dataset();
        api.push_page(records[..2].to_vec(), Some("page-2"), None);
        api.push_page(records[2..].to_vec(), None, Some("tok-42"));
        let engine = engine(&api).await;

        let stats = engine.full_sync().await.unwrap();

        assert_eq!(stats.strategy, SyncStrategy::Full);
        assert_eq!(stats.pages, 2);
        assert_eq!(stats.fetched, 3);
        assert_eq!(stats.created, 3);
        assert_eq!(stats.updated, 0);
        assert_eq!(stats.errors, 0);
        assert!(stats.finished_at.is_some());

        let status = engine.sync_status().await.unwrap();
        assert!(status.has_cursor);
        assert_eq!(status.status, SyncRunStatus::Idle);
        assert_eq!(status.local_active_count, 3);
        assert!(!status.in_progress);

        let latest = engine.store().latest_run().await.unwrap().unwrap();
        assert_eq!(latest.cursor.as_deref(), Some("tok-42"));
        assert!(!engine.needs_full_sync().await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn full_sync_is_idempotent() {
        let api = Arc::new(FakeContactsApi::new());
        api.set_dataset(dataset(), "tok-1");
        let engine = engine(&api).await;

        let first = engine.full_sync().await.unwrap();
        assert_eq!(first.created, 3);

        let second = engine.full_sync().await.unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.deleted, 0);
        assert_eq!(second.updated, 3);
        assert_eq!(engine.store().count_all_contacts().await.unwrap(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn duplicate_identifier_last_one_wins() {
        let api = Arc::new(FakeContactsApi::new());
        api.push_page(
            vec![person_json("1", "First"), person_json("1", "Second")],
            None,
            Some("tok-1"),
        );
        let engine = engine(&api).await.with_options(SyncOptions {
            batch_size: 1,
            run_history: 20,
        });

        let stats = engine.full_sync().await.unwrap();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.updated, 1);

        let stored = engine.store().get_contact("people/1").await.unwrap().unwrap();
        assert_eq!(stored.display_name, "Second");
        assert_eq!(engine.store().count_all_contacts().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn malformed_record_is_counted_not_fatal() {
        let api = Arc::new(FakeContactsApi::new());
        api.push_page(
            vec![
                person_json("1", "Ada"),
                serde_json::json!({"names": [{"displayName": "No id"}]}),
                person_json("2", "Bob"),
                person_json("3", "Cy"),
            ],
            None,
            Some("tok-1"),
        );
        let engine = engine(&api).await;

        let stats = engine.full_sync().await.unwrap();
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.created, 3);
        assert_eq!(engine.store().count_active_contacts().await.unwrap(), 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_triggers_are_single_flight() {
        let api = Arc::new(FakeContactsApi::new().with_latency(Duration::from_millis(50)));
        api.set_dataset(dataset(), "tok-1");
        let engine = engine(&api).await;

        let (first, second) = tokio::join!(engine.auto_sync(), engine.auto_sync());

        let results = [first, second];
        let succeeded = results.iter().filter(|result| result.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|result| matches!(result, Err(SyncError::InProgress)))
            .count();
        assert_eq!((succeeded, rejected), (1, 1));
        assert!(!engine.is_sync_in_progress());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lock_is_released_after_failure() {
        let api = Arc::new(FakeContactsApi::new());
        api.push_error(RemoteError::Rejected {
            status: 403,
            message: "forbidden".to_string(),
        });
        let engine = engine(&api).await;

        let error = engine.full_sync().await.unwrap_err();
        assert!(matches!(error, SyncError::RemoteRejected { status: 403, .. }));
        assert!(!engine.is_sync_in_progress());

        let status = engine.sync_status().await.unwrap();
        assert_eq!(status.status, SyncRunStatus::Error);
        assert!(status.last_error.unwrap().contains("forbidden"));
        assert!(!status.has_cursor);

        api.set_dataset(dataset(), "tok-1");
        assert!(engine.full_sync().await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn shared_lock_rejects_other_engine() {
        let api = Arc::new(FakeContactsApi::new());
        let lock = SyncLock::new();
        let engine = engine(&api).await.with_lock(lock.clone());

        let _held = lock.try_acquire().unwrap();
        assert!(engine.is_sync_in_progress());
        assert!(matches!(
            engine.full_sync().await,
            Err(SyncError::InProgress)
        ));
        assert!(api.requests().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn expired_cursor_falls_back_to_full() {
        let api = Arc::new(FakeContactsApi::new());
        api.set_dataset(dataset(), "tok-1");
        let engine = engine(&api).await;
        engine.full_sync().await.unwrap();

        api.push_error(RemoteError::CursorExpired("EXPIRED_SYNC_TOKEN".to_string()));
        let stats = engine.incremental_sync().await.unwrap();

        assert_eq!(stats.strategy, SyncStrategy::Full);
        assert_eq!(stats.updated, 3);
        assert!(engine.sync_status().await.unwrap().has_cursor);

        let runs = engine.store().list_runs(10).await.unwrap();
        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0].strategy, SyncStrategy::Full);
        assert_eq!(runs[0].cursor.as_deref(), Some("tok-1"));
        assert_eq!(runs[1].strategy, SyncStrategy::Incremental);
        assert_eq!(runs[1].status, SyncRunStatus::Error);
        assert_eq!(runs[1].error.as_deref(), Some(EXPIRED_DETAIL));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn incremental_applies_tombstones() {
        let api = Arc::new(FakeContactsApi::new());
        api.set_dataset(dataset(), "tok-1");
        let engine = engine(&api).await;
        engine.full_sync().await.unwrap();

        api.push_page(
            vec![tombstone_json("2"), tombstone_json("99"), person_json("4", "Dora")],
            None,
            Some("tok-2"),
        );
        let stats = engine.auto_sync().await.unwrap();

        assert_eq!(stats.strategy, SyncStrategy::Incremental);
        assert_eq!(stats.deleted, 1);
        assert_eq!(stats.updated, 0);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.created, 1);

        let requests = api.requests();
        assert_eq!(requests.last().unwrap().sync_token.as_deref(), Some("tok-1"));

        let grace = engine.store().get_contact("people/2").await.unwrap().unwrap();
        assert!(grace.is_deleted);
        let status = engine.sync_status().await.unwrap();
        assert_eq!(status.local_active_count, 3);
        assert_eq!(status.local_total_count, 4);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn incremental_without_cursor_runs_full() {
        let api = Arc::new(FakeContactsApi::new());
        api.set_dataset(dataset(), "tok-1");
        let engine = engine(&api).await;

        assert!(engine.needs_full_sync().await.unwrap());
        let stats = engine.incremental_sync().await.unwrap();
        assert_eq!(stats.strategy, SyncStrategy::Full);
        assert!(api.requests().iter().all(|request| request.sync_token.is_none()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_run_forces_next_full_sync() {
        let api = Arc::new(FakeContactsApi::new());
        api.set_dataset(dataset(), "tok-1");
        let engine = engine(&api).await;
        engine.full_sync().await.unwrap();

        api.push_page(vec![person_json("5", "Eve")], Some("page-2"), None);
        api.push_error(RemoteError::Rejected {
            status: 400,
            message: "bad request".to_string(),
        });
        assert!(engine.auto_sync().await.is_err());

        assert_eq!(engine.store().count_all_contacts().await.unwrap(), 4);
        assert!(engine.needs_full_sync().await.unwrap());
        let stats = engine.auto_sync().await.unwrap();
        assert_eq!(stats.strategy, SyncStrategy::Full);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rate_limited_twice_still_succeeds() {
        let api = Arc::new(FakeContactsApi::new());
        api.push_error(RemoteError::RateLimited("slow down".to_string()));
        api.push_error(RemoteError::RateLimited("slow down".to_string()));
        api.set_dataset(dataset(), "tok-1");
        let engine = engine(&api).await;

        let stats = engine.full_sync().await.unwrap();
        assert_eq!(stats.errors, 0);
        assert_eq!(stats.created, 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rate_limit_exhaustion_surfaces() {
        let api = Arc::new(FakeContactsApi::new());
        for _ in 0..3 {
            api.push_error(RemoteError::RateLimited("slow down".to_string()));
        }
        let engine = engine(&api).await;

        let error = engine.full_sync().await.unwrap_err();
        assert!(matches!(error, SyncError::RateLimitExceeded { attempts: 3 }));
        assert!(error.is_transient());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn stale_syncing_run_is_closed() {
        let api = Arc::new(FakeContactsApi::new());
        api.set_dataset(dataset(), "tok-1");
        let engine = engine(&api).await;
        {
            let db = engine.store().lock().await;
            LibSqlSyncRunRepository::new(db.connection())
                .create(SyncRunStatus::Syncing, SyncStrategy::Full, None)
                .await
                .unwrap();
        }

        engine.full_sync().await.unwrap();

        let runs = engine.store().list_runs(10).await.unwrap();
        assert_eq!(runs[1].status, SyncRunStatus::Error);
        assert_eq!(runs[1].error.as_deref(), Some(INTERRUPTED_DETAIL));
        assert_eq!(runs[0].status, SyncRunStatus::Idle);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn run_history_is_pruned() {
        let api = Arc::new(FakeContactsApi::new());
        api.set_dataset(dataset(), "tok-1");
        let engine = engine(&api).await.with_options(SyncOptions {
            batch_size: 10,
            run_history: 2,
        });

        for _ in 0..4 {
            engine.full_sync().await.unwrap();
        }
        assert_eq!(engine.store().list_runs(10).await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn status_before_any_run() {
        let api = Arc::new(FakeContactsApi::new());
        let engine = engine(&api).await;

        let status = engine.sync_status().await.unwrap();
        assert_eq!(
            status,
            SyncStatus {
                status: SyncRunStatus::Idle,
                in_progress: false,
                strategy: None,
                last_run_at: None,
                has_cursor: false,
                last_error: None,
                local_active_count: 0,
                local_total_count: 0,
            }
        );
    }
}
