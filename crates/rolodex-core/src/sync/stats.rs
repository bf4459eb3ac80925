//! Per-run statistics returned to the caller.

use serde::Serialize;

use super::reconciler::RecordOutcome;
use crate::models::SyncStrategy;
use crate::util::unix_millis_now;

/// Counters accumulated over one sync run. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStatistics {
    pub run_id: i64,
    pub strategy: SyncStrategy,
    pub pages: u64,
    pub fetched: u64,
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub skipped: u64,
    pub errors: u64,
    /// Unix ms
    pub started_at: i64,
    /// Unix ms, set when the run completes
    pub finished_at: Option<i64>,
}

impl SyncStatistics {
    pub fn new(run_id: i64, strategy: SyncStrategy) -> Self {
        Self {
            run_id,
            strategy,
            pages: 0,
            fetched: 0,
            created: 0,
            updated: 0,
            deleted: 0,
            skipped: 0,
            errors: 0,
            started_at: unix_millis_now(),
            finished_at: None,
        }
    }

    /// Count one reconciled record. Each record lands in exactly one bucket.
    pub fn record(&mut self, outcome: RecordOutcome) {
        self.fetched += 1;
        match outcome {
            RecordOutcome::Created => self.created += 1,
            RecordOutcome::Updated => self.updated += 1,
            RecordOutcome::Deleted => self.deleted += 1,
            RecordOutcome::Skipped => self.skipped += 1,
            RecordOutcome::Errored => self.errors += 1,
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(unix_millis_now());
    }

    /// Wall time of a finished run
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at.map(|finished| finished - self.started_at)
    }
}
