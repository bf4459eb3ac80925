//! Remote page fetcher: one request per page, backoff on throttling and
//! server errors, cursor expiry as a typed page result.

use std::sync::Arc;
use std::time::Duration;

use super::credentials::CredentialProvider;
use super::error::{RemoteError, SyncError, SyncResult};
use super::remote::{ContactsApi, PageRequest, RemotePage};
use crate::util::normalize_text_option;

/// Largest page the remote accepts
pub const MAX_PAGE_SIZE: u32 = 1000;

const DEFAULT_PAGE_DELAY_MS: u64 = 100;

/// Exponential backoff for retryable remote failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per page request, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            max_attempts,
            initial_backoff,
        }
    }

    /// Wait before retrying after failed attempt `attempt` (1-based):
    /// `initial_backoff * 2^(attempt - 1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(1))
    }
}

/// One page handed to the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    /// 1-based position within the stream
    pub number: u32,
    /// Raw records, decoded by the reconciler
    pub records: Vec<serde_json::Value>,
    pub next_page_token: Option<String>,
    /// Set on the final page only
    pub cursor: Option<String>,
}

impl FetchedPage {
    pub const fn is_last(&self) -> bool {
        self.next_page_token.is_none()
    }
}

/// Outcome of pulling one page
#[derive(Debug, Clone, PartialEq)]
pub enum PageResult {
    Data(FetchedPage),
    /// The seed cursor is no longer accepted; restart as a full sync
    Expired,
}

/// Builds page streams against a remote contacts API
#[derive(Clone)]
pub struct PageFetcher {
    api: Arc<dyn ContactsApi>,
    credentials: Arc<dyn CredentialProvider>,
    retry: RetryPolicy,
    page_size: u32,
    page_delay: Duration,
}

impl PageFetcher {
    pub fn new(api: Arc<dyn ContactsApi>, credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            api,
            credentials,
            retry: RetryPolicy::default(),
            page_size: MAX_PAGE_SIZE,
            page_delay: Duration::from_millis(DEFAULT_PAGE_DELAY_MS),
        }
    }

    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Page size hint, clamped to `1..=MAX_PAGE_SIZE`
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    /// Pause between successive page requests
    #[must_use]
    pub const fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    pub const fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Start a page stream, seeded with the cursor of a previous run for an
    /// incremental pass.
    pub fn pages(&self, cursor: Option<String>) -> PageStream<'_> {
        PageStream {
            fetcher: self,
            seed_cursor: normalize_text_option(cursor),
            page_token: None,
            fetched: 0,
            finished: false,
        }
    }

    async fn fetch(&self, request: &PageRequest) -> Result<RemotePage, FetchFailure> {
        let mut attempt = 1;
        loop {
            let access_token = self
                .credentials
                .access_token()
                .await
                .map_err(|error| FetchFailure::Sync(error.into()))?;

            match self.api.list_connections(&access_token, request).await {
                Ok(page) => return Ok(page),
                Err(RemoteError::CursorExpired(message)) if request.sync_token.is_some() => {
                    tracing::info!(message = %message, "Sync cursor expired");
                    return Err(FetchFailure::Expired);
                }
                Err(error) if error.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %error,
                        "Page request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(error) => return Err(FetchFailure::Sync(SyncError::from_remote(error, attempt))),
            }
        }
    }
}

enum FetchFailure {
    Expired,
    Sync(SyncError),
}

/// Lazy, finite, non-restartable sequence of pages.
///
/// Only the current page is held; the caller drops each one after use.
pub struct PageStream<'a> {
    fetcher: &'a PageFetcher,
    seed_cursor: Option<String>,
    page_token: Option<String>,
    fetched: u32,
    finished: bool,
}

impl PageStream<'_> {
    /// Pull the next page. `Ok(None)` once the final page has been returned
    /// or after any failure.
    pub async fn next_page(&mut self) -> SyncResult<Option<PageResult>> {
        if self.finished {
            return Ok(None);
        }
        if self.fetched > 0 && !self.fetcher.page_delay.is_zero() {
            tokio::time::sleep(self.fetcher.page_delay).await;
        }

        let request = PageRequest {
            page_size: self.fetcher.page_size,
            page_token: self.page_token.clone(),
            sync_token: self.seed_cursor.clone(),
        };

        let page = match self.fetcher.fetch(&request).await {
            Ok(page) => page,
            Err(FetchFailure::Expired) => {
                self.finished = true;
                return Ok(Some(PageResult::Expired));
            }
            Err(FetchFailure::Sync(error)) => {
                self.finished = true;
                return Err(error);
            }
        };

        let next_token = normalize_text_option(page.next_page_token);
        if next_token.is_some() && next_token == request.page_token {
            self.finished = true;
            return Err(SyncError::InvalidPayload(format!(
                "remote repeated page token after page {}",
                self.fetched + 1
            )));
        }

        self.fetched += 1;
        self.page_token = next_token;
        let cursor = if self.page_token.is_none() {
            self.finished = true;
            normalize_text_option(page.next_sync_token)
        } else {
            None
        };

        tracing::debug!(
            page = self.fetched,
            records = page.connections.len(),
            last = self.finished,
            "Fetched remote page"
        );

        Ok(Some(PageResult::Data(FetchedPage {
            number: self.fetched,
            records: page.connections,
            next_page_token: self.page_token.clone(),
            cursor,
        })))
    }

    /// Pages returned so far
    pub const fn pages_fetched(&self) -> u32 {
        self.fetched
    }
}
