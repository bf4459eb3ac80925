//! Scripted in-memory `ContactsApi` for tests and local demos.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::error::RemoteError;
use super::remote::{ContactsApi, PageRequest, RemotePage};

#[derive(Default)]
struct FakeState {
    script: VecDeque<Result<RemotePage, RemoteError>>,
    dataset: Option<Dataset>,
    requests: Vec<PageRequest>,
}

struct Dataset {
    records: Vec<Value>,
    cursor: String,
}

/// Replays queued responses in order, then falls back to paging over a
/// fixed dataset if one was set.
#[derive(Default)]
pub struct FakeContactsApi {
    state: Mutex<FakeState>,
    latency: Duration,
}

impl FakeContactsApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response, keeping a run in flight for concurrency tests
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Queue one page response
    pub fn push_page(&self, records: Vec<Value>, next_page_token: Option<&str>, cursor: Option<&str>) {
        self.push(Ok(RemotePage {
            connections: records,
            next_page_token: next_page_token.map(str::to_string),
            next_sync_token: cursor.map(str::to_string),
            total_people: None,
        }));
    }

    /// Queue one failed response
    pub fn push_error(&self, error: RemoteError) {
        self.push(Err(error));
    }

    /// Serve `records` in request-sized pages whenever the script is empty.
    /// The final page carries `cursor`.
    pub fn set_dataset(&self, records: Vec<Value>, cursor: &str) {
        self.with_state(|state| {
            state.dataset = Some(Dataset {
                records,
                cursor: cursor.to_string(),
            });
        });
    }

    /// Every request received so far, in order
    pub fn requests(&self) -> Vec<PageRequest> {
        self.with_state(|state| state.requests.clone())
    }

    fn push(&self, response: Result<RemotePage, RemoteError>) {
        self.with_state(|state| state.script.push_back(response));
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FakeState) -> T) -> T {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut state)
    }
}

impl Dataset {
    fn page(&self, request: &PageRequest) -> Result<RemotePage, RemoteError> {
        let offset = match &request.page_token {
            Some(token) => token.parse::<usize>().map_err(|_| RemoteError::Rejected {
                status: 400,
                message: format!("invalid page token {token}"),
            })?,
            None => 0,
        };
        let size = usize::try_from(request.page_size.max(1)).unwrap_or(usize::MAX);
        let end = offset.saturating_add(size).min(self.records.len());
        let records = self.records.get(offset..end).unwrap_or_default().to_vec();
        let last = end >= self.records.len();

        Ok(RemotePage {
            connections: records,
            next_page_token: (!last).then(|| end.to_string()),
            next_sync_token: last.then(|| self.cursor.clone()),
            total_people: u64::try_from(self.records.len()).ok(),
        })
    }
}

#[async_trait]
impl ContactsApi for FakeContactsApi {
    async fn list_connections(
        &self,
        _access_token: &str,
        request: &PageRequest,
    ) -> Result<RemotePage, RemoteError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.with_state(|state| {
            state.requests.push(request.clone());
            if let Some(response) = state.script.pop_front() {
                return response;
            }
            match &state.dataset {
                Some(dataset) => dataset.page(request),
                None => Err(RemoteError::Rejected {
                    status: 400,
                    message: "no scripted response".to_string(),
                }),
            }
        })
    }
}

/// Minimal person record with resource name `people/{id}`
pub fn person_json(id: &str, display_name: &str) -> Value {
    json!({
        "resourceName": format!("people/{id}"),
        "etag": format!("etag-{id}"),
        "names": [{"displayName": display_name}]
    })
}

/// Person record with one phone number
pub fn person_with_phone_json(id: &str, display_name: &str, phone: &str) -> Value {
    json!({
        "resourceName": format!("people/{id}"),
        "etag": format!("etag-{id}"),
        "names": [{"displayName": display_name}],
        "phoneNumbers": [{"value": phone, "type": "mobile"}]
    })
}

/// Deleted-person marker as sent by incremental responses
pub fn tombstone_json(id: &str) -> Value {
    json!({
        "resourceName": format!("people/{id}"),
        "metadata": {"deleted": true}
    })
}
