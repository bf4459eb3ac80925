//! Contact synchronization.
//!
//! A [`SyncEngine`] pulls pages from a [`ContactsApi`] through a
//! [`PageFetcher`] (retry with exponential backoff, typed cursor expiry),
//! hands every record to the [`Reconciler`] and commits the results in
//! bounded batches. Runs are recorded in the `sync_runs` table; the cursor of
//! the final page is only stored once the whole run has been committed.

mod credentials;
mod engine;
mod error;
#[cfg(any(test, feature = "test-util"))]
pub mod fake;
mod fetcher;
mod lock;
mod reconciler;
mod remote;
mod stats;

pub use credentials::{CredentialProvider, StaticCredentials};
pub use engine::{SyncEngine, SyncOptions, SyncStatus};
pub use error::{CredentialsError, RemoteError, SyncError, SyncResult};
pub use fetcher::{FetchedPage, PageFetcher, PageResult, PageStream, RetryPolicy, MAX_PAGE_SIZE};
pub use lock::{SyncLock, SyncLockGuard};
pub use reconciler::{RecordError, RecordOutcome, Reconciler, RemoteChange};
pub use remote::{
    ContactsApi, PageRequest, PeopleApiClient, PersonEmail, PersonMetadata, PersonName,
    PersonOrganization, PersonPhone, RemotePage, RemotePerson, PERSON_FIELDS,
};
pub use stats::SyncStatistics;
