use std::env;
use std::path::PathBuf;

use chrono::Utc;
use rolodex_core::config::DEFAULT_DB_PATH;
use rolodex_core::models::SyncRunStatus;
use rolodex_core::{
    Contact, DatabaseService, RolodexConfig, SyncEngine, SyncStatistics, SyncStatus,
};
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ContactListItem {
    pub external_id: String,
    pub display_name: String,
    pub organization: Option<String>,
    pub phones: Vec<String>,
    pub deleted: bool,
    pub synced_at: i64,
}

pub fn contact_to_list_item(contact: &Contact) -> ContactListItem {
    ContactListItem {
        external_id: contact.external_id.clone(),
        display_name: contact.display_name.clone(),
        organization: contact.organization.clone(),
        phones: contact
            .phones
            .iter()
            .map(|phone| phone.number.clone())
            .collect(),
        deleted: contact.is_deleted,
        synced_at: contact.synced_at,
    }
}

pub fn format_contact_lines(contacts: &[Contact]) -> Vec<String> {
    if contacts.is_empty() {
        return vec!["No contacts found.".to_string()];
    }

    contacts
        .iter()
        .map(|contact| {
            let phone = contact
                .primary_phone()
                .map_or("-", |phone| phone.number.as_str());
            let extra = contact.phones.len().saturating_sub(1);
            let more = if extra > 0 {
                format!(" (+{extra})")
            } else {
                String::new()
            };
            format!("{:<32} {phone}{more}", contact.display_name)
        })
        .collect()
}

pub fn format_contact_detail(contact: &Contact, now_ms: i64) -> Vec<String> {
    let mut lines = vec![contact.display_name.clone()];
    lines.push(format!("  id:           {}", contact.external_id));
    if let Some(given) = &contact.given_name {
        lines.push(format!("  given name:   {given}"));
    }
    if let Some(family) = &contact.family_name {
        lines.push(format!("  family name:  {family}"));
    }
    if let Some(organization) = &contact.organization {
        lines.push(format!("  organization: {organization}"));
    }
    for phone in &contact.phones {
        match &phone.label {
            Some(label) => lines.push(format!("  phone:        {} ({label})", phone.number)),
            None => lines.push(format!("  phone:        {}", phone.number)),
        }
    }
    if contact.is_deleted {
        lines.push("  deleted on remote".to_string());
    }
    lines.push(format!(
        "  synced:       {}",
        format_relative_time(contact.synced_at, now_ms)
    ));
    lines
}

pub fn format_statistics(stats: &SyncStatistics) -> String {
    format!(
        "{} sync completed: {} pages, {} records ({} created, {} updated, {} deleted, {} skipped, {} errors) in {}ms",
        capitalize(stats.strategy.as_str()),
        stats.pages,
        stats.fetched,
        stats.created,
        stats.updated,
        stats.deleted,
        stats.skipped,
        stats.errors,
        stats.duration_ms().unwrap_or_default()
    )
}

pub fn format_status_lines(status: &SyncStatus, now_ms: i64) -> Vec<String> {
    let state = if status.in_progress {
        "syncing (running now)".to_string()
    } else {
        status.status.to_string()
    };
    let mut lines = vec![format!("Status:    {state}")];

    match (status.strategy, status.last_run_at) {
        (Some(strategy), Some(at)) => lines.push(format!(
            "Last run:  {strategy}, {} ({})",
            format_relative_time(at, now_ms),
            format_sync_timestamp(at)
        )),
        (Some(strategy), None) => lines.push(format!("Last run:  {strategy}, not finished")),
        _ => lines.push("Last run:  never".to_string()),
    }

    lines.push(format!(
        "Next sync: {}",
        if status.has_cursor {
            "incremental"
        } else {
            "full"
        }
    ));
    if status.status == SyncRunStatus::Error {
        if let Some(error) = &status.last_error {
            lines.push(format!("Error:     {error}"));
        }
    }
    lines.push(format!(
        "Contacts:  {} active, {} total",
        status.local_active_count, status.local_total_count
    ));
    lines
}

pub fn format_sync_timestamp(timestamp_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(timestamp_ms).map_or_else(
        || timestamp_ms.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

pub fn normalize_search_query(query: &str) -> Result<String, CliError> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptySearchQuery);
    }
    Ok(trimmed.to_string())
}

pub fn normalize_contact_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyContactId);
    }
    Ok(trimmed.to_string())
}

pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// `--db-path`, then `ROLODEX_DB_PATH`, then the per-user data directory
pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("ROLODEX_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir().map_or_else(
        || PathBuf::from(DEFAULT_DB_PATH),
        |dir| dir.join("rolodex").join(DEFAULT_DB_PATH),
    )
}

/// Runtime context shared by all data commands
pub struct Context {
    pub config: RolodexConfig,
}

impl Context {
    pub fn load(cli_db_path: Option<PathBuf>) -> Result<Self, CliError> {
        let mut config = RolodexConfig::from_env()?;
        config.db_path = resolve_db_path(cli_db_path);
        tracing::debug!(?config, "Loaded configuration");
        Ok(Self { config })
    }

    pub async fn open_store(&self) -> Result<DatabaseService, CliError> {
        Ok(DatabaseService::open_path(&self.config.db_path).await?)
    }

    pub async fn engine(&self) -> Result<SyncEngine, CliError> {
        let store = self.open_store().await?;
        Ok(SyncEngine::from_config(store, &self.config)?)
    }
}
