//! Record reconciler: projects one raw remote record onto the local contact
//! shape and applies it to a repository.

use serde::Serialize;
use thiserror::Error;

use super::remote::{PersonPhone, RemotePerson};
use crate::db::{ContactRepository, Upserted};
use crate::models::{ContactDraft, ContactPhone};
use crate::phone::PhoneNormalizer;
use crate::util::non_empty_trimmed;

/// Classification of one applied record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordOutcome {
    Created,
    Updated,
    Deleted,
    /// Tombstone for a contact never seen locally
    Skipped,
    /// Record could not be interpreted; nothing was written
    Errored,
}

/// What a remote record asks the local store to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteChange {
    Upsert(ContactDraft),
    Tombstone { external_id: String },
}

/// Why a single record was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("record does not match the person shape: {0}")]
    Undecodable(String),
    #[error("record has no resource identifier")]
    MissingIdentifier,
}

/// Applies remote records with create/update/soft-delete semantics
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    normalizer: PhoneNormalizer,
}

impl Reconciler {
    pub const fn new(normalizer: PhoneNormalizer) -> Self {
        Self { normalizer }
    }

    /// Decode a raw record and derive the local change it implies
    pub fn project(&self, record: &serde_json::Value) -> Result<RemoteChange, RecordError> {
        let person: RemotePerson = serde_json::from_value(record.clone())
            .map_err(|error| RecordError::Undecodable(error.to_string()))?;

        let external_id = non_empty_trimmed(person.resource_name.as_deref())
            .ok_or(RecordError::MissingIdentifier)?
            .to_string();

        if person.is_deleted() {
            return Ok(RemoteChange::Tombstone { external_id });
        }

        let name = person.names.first();
        let given_name = name
            .and_then(|name| non_empty_trimmed(name.given_name.as_deref()))
            .map(str::to_string);
        let family_name = name
            .and_then(|name| non_empty_trimmed(name.family_name.as_deref()))
            .map(str::to_string);
        let organization = person
            .organizations
            .iter()
            .find_map(|org| non_empty_trimmed(org.name.as_deref()))
            .map(str::to_string);

        let display_name = name
            .and_then(|name| non_empty_trimmed(name.display_name.as_deref()))
            .map(str::to_string)
            .or_else(|| match (&given_name, &family_name) {
                (Some(given), Some(family)) => Some(format!("{given} {family}")),
                (Some(given), None) => Some(given.clone()),
                (None, Some(family)) => Some(family.clone()),
                (None, None) => None,
            })
            .or_else(|| organization.clone())
            .or_else(|| {
                person
                    .email_addresses
                    .iter()
                    .find_map(|email| non_empty_trimmed(email.value.as_deref()))
                    .map(str::to_string)
            })
            .unwrap_or_else(|| external_id.clone());

        Ok(RemoteChange::Upsert(ContactDraft {
            phones: self.phones(&external_id, &person.phone_numbers),
            external_id,
            etag: non_empty_trimmed(person.etag.as_deref()).map(str::to_string),
            display_name,
            given_name,
            family_name,
            organization,
        }))
    }

    /// Normalize phone entries, dropping invalid ones and duplicates
    fn phones(&self, external_id: &str, entries: &[PersonPhone]) -> Vec<ContactPhone> {
        let mut phones: Vec<ContactPhone> = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(raw) = non_empty_trimmed(entry.canonical_form.as_deref())
                .or_else(|| non_empty_trimmed(entry.value.as_deref()))
            else {
                continue;
            };

            let number = match self.normalizer.normalize(raw) {
                Ok(number) => number,
                Err(error) => {
                    tracing::debug!(external_id, error = %error, "Dropping invalid phone number");
                    continue;
                }
            };
            if phones.iter().any(|phone| phone.number == number) {
                continue;
            }

            let label = non_empty_trimmed(entry.kind.as_deref())
                .or_else(|| non_empty_trimmed(entry.formatted_type.as_deref()))
                .map(str::to_lowercase);
            phones.push(ContactPhone::new(number, label));
        }
        phones
    }

    /// Apply one record. Malformed records are counted, not raised; only
    /// storage failures are returned as errors.
    pub async fn apply<R: ContactRepository>(
        &self,
        repo: &R,
        record: &serde_json::Value,
    ) -> crate::Result<RecordOutcome> {
        match self.project(record) {
            Ok(RemoteChange::Upsert(draft)) => Ok(match repo.upsert(&draft).await? {
                Upserted::Created(_) => RecordOutcome::Created,
                Upserted::Updated(_) => RecordOutcome::Updated,
            }),
            Ok(RemoteChange::Tombstone { external_id }) => {
                match repo.find_by_external_id(&external_id).await? {
                    Some(existing) => {
                        repo.mark_deleted(&existing.id).await?;
                        Ok(RecordOutcome::Deleted)
                    }
                    None => Ok(RecordOutcome::Skipped),
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, "Skipping malformed remote record");
                Ok(RecordOutcome::Errored)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LibSqlContactRepository};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn draft(change: RemoteChange) -> ContactDraft {
        match change {
            RemoteChange::Upsert(draft) => draft,
            RemoteChange::Tombstone { .. } => panic!("expected upsert"),
        }
    }

    fn display_name(record: serde_json::Value) -> String {
        draft(Reconciler::default().project(&record).unwrap()).display_name
    }

    #[test]
    fn display_name_preference_order() {
        assert_eq!(
            display_name(json!({
                "resourceName": "people/1",
                "names": [{"displayName": "Dr. Ada", "givenName": "Ada", "familyName": "Lovelace"}]
            })),
            "Dr. Ada"
        );
        assert_eq!(
            display_name(json!({
                "resourceName": "people/1",
                "names": [{"givenName": "Ada", "familyName": "Lovelace"}]
            })),
            "Ada Lovelace"
        );
        assert_eq!(
            display_name(json!({"resourceName": "people/1", "names": [{"givenName": "Ada"}]})),
            "Ada"
        );
        assert_eq!(
            display_name(json!({"resourceName": "people/1", "names": [{"familyName": "Lovelace"}]})),
            "Lovelace"
        );
        assert_eq!(
            display_name(json!({
                "resourceName": "people/1",
                "organizations": [{"name": " "}, {"name": "Analytical Engines"}]
            })),
            "Analytical Engines"
        );
        assert_eq!(
            display_name(json!({
                "resourceName": "people/1",
                "emailAddresses": [{"value": "ada@example.com"}]
            })),
            "ada@example.com"
        );
        assert_eq!(display_name(json!({"resourceName": "people/1"})), "people/1");
    }

    #[test]
    fn normalizes_and_dedupes_phones() {
        let reconciler = Reconciler::new(PhoneNormalizer::new(Some("41")));
        let record = json!({
            "resourceName": "people/1",
            "phoneNumbers": [
                {"value": "044 668 18 00", "type": "work"},
                {"value": "+41 44 668 18 00", "canonicalForm": "+41446681800", "formattedType": "Mobile"},
                {"value": "call reception"},
                {"value": "  "},
                {"value": "+1 415 555 0100", "formattedType": "Home"}
            ]
        });

        let draft = draft(reconciler.project(&record).unwrap());
        assert_eq!(
            draft.phones,
            vec![
                ContactPhone::new("+41446681800", Some("work".to_string())),
                ContactPhone::new("+14155550100", Some("home".to_string())),
            ]
        );
    }

    #[test]
    fn tombstones_and_bad_records() {
        let reconciler = Reconciler::default();
        assert_eq!(
            reconciler
                .project(&json!({"resourceName": "people/9", "metadata": {"deleted": true}}))
                .unwrap(),
            RemoteChange::Tombstone {
                external_id: "people/9".to_string()
            }
        );
        assert_eq!(
            reconciler.project(&json!({"names": [{"displayName": "Nobody"}]})),
            Err(RecordError::MissingIdentifier)
        );
        assert!(matches!(
            reconciler.project(&json!({"resourceName": 42})),
            Err(RecordError::Undecodable(_))
        ));
        assert!(matches!(
            reconciler.project(&json!("not an object")),
            Err(RecordError::Undecodable(_))
        ));
    }

    #[test]
    fn mistyped_phone_entry_is_dropped_not_the_record() {
        let record = json!({
            "resourceName": "people/1",
            "names": [{"displayName": "Ada"}],
            "phoneNumbers": [{"value": "+44 20 7946 0000"}, {"value": 5_551_234}]
        });

        let draft = draft(Reconciler::default().project(&record).unwrap());
        assert_eq!(draft.display_name, "Ada");
        assert_eq!(draft.phones, vec![ContactPhone::new("+442079460000", None)]);
    }

    #[test]
    fn tombstone_survives_malformed_fields() {
        let record = json!({
            "resourceName": "people/1",
            "metadata": {"deleted": true},
            "names": {"displayName": "Ada"}
        });
        assert_eq!(
            Reconciler::default().project(&record).unwrap(),
            RemoteChange::Tombstone {
                external_id: "people/1".to_string()
            }
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn apply_classifies_outcomes() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlContactRepository::new(db.connection());
        let reconciler = Reconciler::default();
        let ada = json!({"resourceName": "people/1", "names": [{"displayName": "Ada"}]});
        let tombstone = json!({"resourceName": "people/1", "metadata": {"deleted": true}});

        assert_eq!(reconciler.apply(&repo, &ada).await.unwrap(), RecordOutcome::Created);
        assert_eq!(reconciler.apply(&repo, &ada).await.unwrap(), RecordOutcome::Updated);
        assert_eq!(
            reconciler.apply(&repo, &tombstone).await.unwrap(),
            RecordOutcome::Deleted
        );
        assert_eq!(
            reconciler
                .apply(
                    &repo,
                    &json!({"resourceName": "people/404", "metadata": {"deleted": true}})
                )
                .await
                .unwrap(),
            RecordOutcome::Skipped
        );
        assert_eq!(
            reconciler.apply(&repo, &json!({})).await.unwrap(),
            RecordOutcome::Errored
        );

        let row = repo.find_by_external_id("people/1").await.unwrap().unwrap();
        assert!(row.is_deleted);
        assert_eq!(repo.count_active().await.unwrap(), 0);
        assert_eq!(repo.count_total().await.unwrap(), 1);
    }
}
