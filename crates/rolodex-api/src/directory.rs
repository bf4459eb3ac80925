//! IP-phone directory endpoints.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use rolodex_core::directory::{
    directory_entries, render_directory_page, render_menu, render_search_input,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::routes::{base_url, xml_response, AppState};

/// Upper bound of contacts scanned to build one listing
const DIRECTORY_SCAN_LIMIT: usize = 10_000;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/directory", get(menu))
        .route("/directory/search", get(search_form))
        .route("/directory/list", get(list))
}

#[derive(Debug, Deserialize)]
struct ListParams {
    page: Option<usize>,
    q: Option<String>,
}

async fn menu(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let base_url = base_url(&headers, &state.config);
    xml_response(render_menu(&state.config.directory_title, &base_url))
}

async fn search_form(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let base_url = base_url(&headers, &state.config);
    xml_response(render_search_input(&state.config.directory_title, &base_url))
}

async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<impl IntoResponse, AppError> {
    let query = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|query| !query.is_empty());
    let contacts = match query {
        Some(query) => state.store.search_contacts(query, DIRECTORY_SCAN_LIMIT).await?,
        None => state.store.list_contacts(DIRECTORY_SCAN_LIMIT, 0).await?,
    };

    let entries = directory_entries(&contacts);
    let base_url = base_url(&headers, &state.config);
    Ok(xml_response(render_directory_page(
        &state.config.directory_title,
        &base_url,
        &entries,
        params.page.unwrap_or(1),
        query,
    )))
}
