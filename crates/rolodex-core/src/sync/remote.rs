//! Remote contacts API: wire types, the `ContactsApi` seam and the
//! People-style HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use super::error::{RemoteError, EXPIRED_SYNC_TOKEN};
use crate::util::{compact_text, is_http_url, normalize_text_option};

/// Fields requested for every person
pub const PERSON_FIELDS: &str = "names,phoneNumbers,organizations,emailAddresses,metadata";

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Parameters of one page request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageRequest {
    pub page_size: u32,
    /// Continuation token of the previous page
    pub page_token: Option<String>,
    /// Cursor of a previous completed run (incremental sync)
    pub sync_token: Option<String>,
}

/// One page as returned by the remote
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePage {
    /// Raw person records, decoded one by one during reconciliation
    #[serde(default)]
    pub connections: Vec<serde_json::Value>,
    pub next_page_token: Option<String>,
    /// Present on the final page only
    pub next_sync_token: Option<String>,
    pub total_people: Option<u64>,
}

/// Decoded remote person. Every sub-structure is optional.
///
/// Only `resourceName` must have the right type. Mistyped sub-structures and
/// list entries are dropped instead of failing the whole record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePerson {
    pub resource_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_option")]
    pub etag: Option<String>,
    #[serde(default, deserialize_with = "lenient_option")]
    pub metadata: Option<PersonMetadata>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub names: Vec<PersonName>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub phone_numbers: Vec<PersonPhone>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub organizations: Vec<PersonOrganization>,
    #[serde(default, deserialize_with = "lenient_vec")]
    pub email_addresses: Vec<PersonEmail>,
}

impl RemotePerson {
    /// Tombstone marker set by incremental responses
    pub fn is_deleted(&self) -> bool {
        self.metadata.as_ref().is_some_and(|metadata| metadata.deleted)
    }
}

fn lenient_option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match serde_json::from_value(value) {
        Ok(decoded) => Some(decoded),
        Err(error) => {
            tracing::debug!(error = %error, "Ignoring mistyped person field");
            None
        }
    }))
}

fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let entries = match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Array(entries)) => entries,
        None | Some(serde_json::Value::Null) => return Ok(Vec::new()),
        Some(_) => {
            tracing::debug!("Ignoring person field that is not a list");
            return Ok(Vec::new());
        }
    };

    Ok(entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value(entry) {
            Ok(decoded) => Some(decoded),
            Err(error) => {
                tracing::debug!(error = %error, "Dropping mistyped person entry");
                None
            }
        })
        .collect())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonMetadata {
    #[serde(default)]
    pub deleted: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonName {
    pub display_name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonPhone {
    pub value: Option<String>,
    /// E.164 form computed by the remote, when it could
    pub canonical_form: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub formatted_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PersonOrganization {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PersonEmail {
    pub value: Option<String>,
}

/// Source of remote contact pages
#[async_trait]
pub trait ContactsApi: Send + Sync {
    /// Fetch exactly one page. No retries happen at this level.
    async fn list_connections(
        &self,
        access_token: &str,
        request: &PageRequest,
    ) -> Result<RemotePage, RemoteError>;
}

/// HTTP client for a People-style `connections` endpoint
#[derive(Debug, Clone)]
pub struct PeopleApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl PeopleApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RemoteError> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|error| RemoteError::Transport(sanitize(&error)))?;
        Ok(Self { base_url, client })
    }

    fn connections_url(&self, request: &PageRequest) -> String {
        let mut url = format!(
            "{}/v1/people/me/connections?personFields={}&pageSize={}&requestSyncToken=true",
            self.base_url,
            urlencoding::encode(PERSON_FIELDS),
            request.page_size
        );
        if let Some(page_token) = &request.page_token {
            url.push_str("&pageToken=");
            url.push_str(&urlencoding::encode(page_token));
        }
        if let Some(sync_token) = &request.sync_token {
            url.push_str("&syncToken=");
            url.push_str(&urlencoding::encode(sync_token));
        }
        url
    }
}

#[async_trait]
impl ContactsApi for PeopleApiClient {
    async fn list_connections(
        &self,
        access_token: &str,
        request: &PageRequest,
    ) -> Result<RemotePage, RemoteError> {
        let response = self
            .client
            .get(self.connections_url(request))
            .bearer_auth(access_token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|error| RemoteError::Transport(sanitize(&error)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_error_response(status.as_u16(), &body));
        }

        response
            .json::<RemotePage>()
            .await
            .map_err(|error| RemoteError::InvalidPayload(sanitize(&error)))
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    status: Option<String>,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

/// Classify on the raw body; the compacted message may cut off the reason.
fn classify_error_response(status: u16, body: &str) -> RemoteError {
    let message = parse_api_error(status, body);
    if body.contains(EXPIRED_SYNC_TOKEN) {
        return RemoteError::CursorExpired(message);
    }
    RemoteError::from_response(status, message)
}

/// Compact a remote error body into one line, keeping machine-readable
/// reasons such as `EXPIRED_SYNC_TOKEN`.
fn parse_api_error(status: u16, body: &str) -> String {
    if let Ok(ApiErrorEnvelope { error: Some(error) }) = serde_json::from_str(body) {
        let mut message = error
            .message
            .map_or_else(|| format!("HTTP {status}"), |message| compact_text(&message));
        if let Some(code) = error.status {
            message = format!("{message} [{code}]");
        }
        let reasons: Vec<&str> = error
            .details
            .iter()
            .filter_map(|detail| detail.get("reason").and_then(serde_json::Value::as_str))
            .collect();
        if !reasons.is_empty() {
            message = format!("{message} ({})", reasons.join(", "));
        }
        return message;
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {status}")
    } else {
        trimmed
    }
}

fn normalize_base_url(raw: String) -> Result<String, RemoteError> {
    let base_url = normalize_text_option(Some(raw))
        .ok_or_else(|| RemoteError::Transport("remote API URL must not be empty".to_string()))?;
    if is_http_url(&base_url) {
        Ok(base_url.trim_end_matches('/').to_string())
    } else {
        Err(RemoteError::Transport(
            "remote API URL must include http:// or https://".to_string(),
        ))
    }
}

fn sanitize(error: &impl std::fmt::Display) -> String {
    error.to_string().replace('\n', " ").trim().to_string()
}
