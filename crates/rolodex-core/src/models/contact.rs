//! Contact model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A unique local identifier for a contact, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactId(Uuid);

impl ContactId {
    /// Create a new unique contact ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ContactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ContactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContactId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A phone number attached to a contact, already in canonical dialing form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPhone {
    /// Canonical dialing form, e.g. `+41446681800`
    pub number: String,
    /// Remote label such as `mobile` or `work`
    pub label: Option<String>,
}

impl ContactPhone {
    pub fn new(number: impl Into<String>, label: Option<String>) -> Self {
        Self {
            number: number.into(),
            label,
        }
    }

    /// Digits only, used for phone search
    #[must_use]
    pub fn digits(&self) -> String {
        self.number.chars().filter(char::is_ascii_digit).collect()
    }
}

/// A contact mirrored from the remote address book
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Local identifier
    pub id: ContactId,
    /// Stable remote identifier (reconciliation key)
    pub external_id: String,
    /// Remote version tag, kept as an opaque hint
    pub etag: Option<String>,
    /// Never empty
    pub display_name: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub organization: Option<String>,
    pub phones: Vec<ContactPhone>,
    /// Soft delete flag set by remote tombstones
    pub is_deleted: bool,
    /// Last time the sync path touched this row (Unix ms)
    pub synced_at: i64,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl Contact {
    /// Build a fresh, not yet persisted contact from a draft
    #[must_use]
    pub fn from_draft(draft: ContactDraft) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            id: ContactId::new(),
            external_id: draft.external_id,
            etag: draft.etag,
            display_name: draft.display_name,
            given_name: draft.given_name,
            family_name: draft.family_name,
            organization: draft.organization,
            phones: draft.phones,
            is_deleted: false,
            synced_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    /// First phone number, if any
    #[must_use]
    pub fn primary_phone(&self) -> Option<&ContactPhone> {
        self.phones.first()
    }
}

/// The mutable, remote-derived fields of a contact.
///
/// Produced by the reconciler and applied wholesale on every sighting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactDraft {
    pub external_id: String,
    pub etag: Option<String>,
    pub display_name: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub organization: Option<String>,
    pub phones: Vec<ContactPhone>,
}

impl ContactDraft {
    /// Minimal draft with only identifier and display name
    pub fn new(external_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            etag: None,
            display_name: display_name.into(),
            given_name: None,
            family_name: None,
            organization: None,
            phones: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_phone(mut self, number: impl Into<String>, label: Option<&str>) -> Self {
        self.phones
            .push(ContactPhone::new(number, label.map(str::to_string)));
        self
    }
}
