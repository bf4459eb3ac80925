use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use rolodex_core::{Contact, DatabaseService, SyncEngine, SyncStatistics, SyncStatus};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::config::AppConfig;
use crate::directory;
use crate::error::AppError;

const DEFAULT_LIST_LIMIT: usize = 100;
const MAX_LIST_LIMIT: usize = 1_000;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: DatabaseService,
    pub engine: Arc<SyncEngine>,
}

impl AppState {
    pub fn new(config: Arc<AppConfig>, engine: SyncEngine) -> Self {
        Self {
            store: engine.store().clone(),
            engine: Arc::new(engine),
            config,
        }
    }
}

pub fn app_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/contacts", get(list_contacts))
        .route("/contacts/search", get(search_contacts))
        .route("/contacts/{external_id}", get(get_contact))
        .route("/sync", post(auto_sync))
        .route("/sync/full", post(full_sync))
        .route("/sync/incremental", post(incremental_sync))
        .route("/sync/status", get(sync_status));

    Router::new()
        .route("/healthz", get(healthz))
        .nest("/v1", api_routes)
        .merge(directory::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: i64,
    sync_in_progress: bool,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().timestamp(),
        sync_in_progress: state.engine.is_sync_in_progress(),
    })
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ContactList {
    contacts: Vec<Contact>,
    total: usize,
}

fn page_limit(limit: Option<usize>) -> Result<usize, AppError> {
    match limit {
        None => Ok(DEFAULT_LIST_LIMIT),
        Some(limit) if (1..=MAX_LIST_LIMIT).contains(&limit) => Ok(limit),
        Some(_) => Err(AppError::bad_request(format!(
            "limit must be in [1, {MAX_LIST_LIMIT}]"
        ))),
    }
}

async fn list_contacts(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ContactList>, AppError> {
    let limit = page_limit(query.limit)?;
    let contacts = state
        .store
        .list_contacts(limit, query.offset.unwrap_or(0))
        .await?;
    let total = state.store.count_active_contacts().await?;
    Ok(Json(ContactList { contacts, total }))
}

async fn search_contacts(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ContactList>, AppError> {
    let limit = page_limit(params.limit)?;
    if params.q.trim().is_empty() {
        return Err(AppError::bad_request("q must not be empty"));
    }
    let contacts = state.store.search_contacts(&params.q, limit).await?;
    Ok(Json(ContactList {
        total: contacts.len(),
        contacts,
    }))
}

async fn get_contact(
    State(state): State<AppState>,
    Path(external_id): Path<String>,
) -> Result<Json<Contact>, AppError> {
    state
        .store
        .get_contact(&external_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("contact {external_id}")))
}

async fn auto_sync(State(state): State<AppState>) -> Result<Json<SyncStatistics>, AppError> {
    Ok(Json(state.engine.auto_sync().await?))
}

async fn full_sync(State(state): State<AppState>) -> Result<Json<SyncStatistics>, AppError> {
    Ok(Json(state.engine.full_sync().await?))
}

async fn incremental_sync(
    State(state): State<AppState>,
) -> Result<Json<SyncStatistics>, AppError> {
    Ok(Json(state.engine.incremental_sync().await?))
}

async fn sync_status(State(state): State<AppState>) -> Result<Json<SyncStatus>, AppError> {
    Ok(Json(state.engine.sync_status().await?))
}

/// Absolute base URL for links handed to phones, taken from the `Host`
/// header when present.
pub fn base_url(headers: &HeaderMap, config: &AppConfig) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(&config.bind_addr);
    format!("http://{host}")
}

/// XML body with the content type IP phones expect
pub fn xml_response(body: String) -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/xml; charset=utf-8")], body)
}
