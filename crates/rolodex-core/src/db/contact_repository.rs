//! Contact repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use crate::error::{Error, Result};
use crate::models::{Contact, ContactDraft, ContactId, ContactPhone};
use crate::search::SearchQuery;
use libsql::{params, Connection, Row};

const CONTACT_COLUMNS: &str = "id, external_id, etag, display_name, given_name, family_name, \
     organization, is_deleted, synced_at, created_at, updated_at";

/// Result of an upsert keyed by external identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    /// No row existed for the external identifier
    Created(ContactId),
    /// An existing row (deleted or not) was fully replaced
    Updated(ContactId),
}

impl Upserted {
    pub const fn id(self) -> ContactId {
        match self {
            Self::Created(id) | Self::Updated(id) => id,
        }
    }
}

/// Trait for contact storage operations (async)
#[allow(async_fn_in_trait)]
pub trait ContactRepository {
    /// Find a contact by remote identifier, including soft-deleted rows
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Contact>>;

    /// Insert or fully replace the contact with `draft.external_id`.
    ///
    /// Replacement rewrites every mutable field, swaps the phone set and
    /// clears the soft-delete flag.
    async fn upsert(&self, draft: &ContactDraft) -> Result<Upserted>;

    /// Set the soft-delete flag on an existing row
    async fn mark_deleted(&self, id: &ContactId) -> Result<()>;

    /// List active contacts ordered by display name
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Contact>>;

    /// Search active contacts by name, organization or phone digits
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Contact>>;

    /// Number of contacts not flagged deleted
    async fn count_active(&self) -> Result<usize>;

    /// Number of rows including soft-deleted ones
    async fn count_total(&self) -> Result<usize>;
}

/// libSQL implementation of `ContactRepository`
pub struct LibSqlContactRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlContactRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Replace the phone set of a contact
    async fn replace_phones(&self, id: &ContactId, phones: &[ContactPhone]) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM contact_phones WHERE contact_id = ?",
                [id.as_str()],
            )
            .await?;

        for (position, phone) in phones.iter().enumerate() {
            self.conn
                .execute(
                    "INSERT INTO contact_phones (contact_id, position, number, label, digits)
                     VALUES (?, ?, ?, ?, ?)",
                    params![
                        id.as_str(),
                        position as i64,
                        phone.number.clone(),
                        phone.label.clone(),
                        phone.digits()
                    ],
                )
                .await?;
        }

        Ok(())
    }

    async fn load_phones(&self, id: &ContactId) -> Result<Vec<ContactPhone>> {
        let mut rows = self
            .conn
            .query(
                "SELECT number, label FROM contact_phones WHERE contact_id = ? ORDER BY position",
                [id.as_str()],
            )
            .await?;

        let mut phones = Vec::new();
        while let Some(row) = rows.next().await? {
            phones.push(ContactPhone {
                number: row.get(0)?,
                label: row.get::<Option<String>>(1)?,
            });
        }
        Ok(phones)
    }

    /// Collect contacts from a row set and attach their phones
    async fn collect(&self, mut rows: libsql::Rows) -> Result<Vec<Contact>> {
        let mut contacts = Vec::new();
        while let Some(row) = rows.next().await? {
            contacts.push(Self::parse_contact(&row)?);
        }
        for contact in &mut contacts {
            contact.phones = self.load_phones(&contact.id).await?;
        }
        Ok(contacts)
    }

    async fn count(&self, sql: &str) -> Result<usize> {
        let mut rows = self.conn.query(sql, ()).await?;
        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Parse a contact (without phones) from a database row
    fn parse_contact(row: &Row) -> Result<Contact> {
        let id: String = row.get(0)?;
        let id = id
            .parse()
            .map_err(|_| Error::Database(format!("invalid contact id `{id}`")))?;
        Ok(Contact {
            id,
            external_id: row.get(1)?,
            etag: row.get::<Option<String>>(2)?,
            display_name: row.get(3)?,
            given_name: row.get::<Option<String>>(4)?,
            family_name: row.get::<Option<String>>(5)?,
            organization: row.get::<Option<String>>(6)?,
            is_deleted: row.get::<i64>(7)? != 0,
            synced_at: row.get(8)?,
            created_at: row.get(9)?,
            updated_at: row.get(10)?,
            phones: Vec::new(),
        })
    }
}

impl ContactRepository for LibSqlContactRepository<'_> {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Contact>> {
        let rows = self
            .conn
            .query(
                &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE external_id = ?"),
                [external_id],
            )
            .await?;

        Ok(self.collect(rows).await?.into_iter().next())
    }

    async fn upsert(&self, draft: &ContactDraft) -> Result<Upserted> {
        let now = chrono::Utc::now().timestamp_millis();

        if let Some(existing) = self.find_by_external_id(&draft.external_id).await? {
            self.conn
                .execute(
                    "UPDATE contacts
                     SET etag = ?, display_name = ?, given_name = ?, family_name = ?,
                         organization = ?, is_deleted = 0, synced_at = ?, updated_at = ?
                     WHERE id = ?",
                    params![
                        draft.etag.clone(),
                        draft.display_name.clone(),
                        draft.given_name.clone(),
                        draft.family_name.clone(),
                        draft.organization.clone(),
                        now,
                        now,
                        existing.id.as_str()
                    ],
                )
                .await?;
            self.replace_phones(&existing.id, &draft.phones).await?;
            return Ok(Upserted::Updated(existing.id));
        }

        let contact = Contact::from_draft(draft.clone());
        self.conn
            .execute(
                "INSERT INTO contacts (id, external_id, etag, display_name, given_name, family_name,
                                       organization, is_deleted, synced_at, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)",
                params![
                    contact.id.as_str(),
                    contact.external_id.clone(),
                    contact.etag.clone(),
                    contact.display_name.clone(),
                    contact.given_name.clone(),
                    contact.family_name.clone(),
                    contact.organization.clone(),
                    contact.synced_at,
                    contact.created_at,
                    contact.updated_at
                ],
            )
            .await?;
        self.replace_phones(&contact.id, &contact.phones).await?;

        Ok(Upserted::Created(contact.id))
    }

    async fn mark_deleted(&self, id: &ContactId) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();

        let rows = self
            .conn
            .execute(
                "UPDATE contacts SET is_deleted = 1, synced_at = ?, updated_at = ? WHERE id = ?",
                params![now, now, id.as_str()],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Contact>> {
        let rows = self
            .conn
            .query(
                &format!(
                    "SELECT {CONTACT_COLUMNS}
                     FROM contacts
                     WHERE is_deleted = 0
                     ORDER BY display_name COLLATE NOCASE ASC, external_id ASC
                     LIMIT ? OFFSET ?"
                ),
                params![limit as i64, offset as i64],
            )
            .await?;

        self.collect(rows).await
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Contact>> {
        let query = SearchQuery::parse(query);
        let Some(pattern) = query.like_pattern() else {
            return self.list(limit, 0).await;
        };

        let filter = match query {
            SearchQuery::Phone(_) => {
                "id IN (SELECT contact_id FROM contact_phones WHERE digits LIKE ?1)"
            }
            _ => {
                "(display_name LIKE ?1 ESCAPE '\\'
                  OR given_name LIKE ?1 ESCAPE '\\'
                  OR family_name LIKE ?1 ESCAPE '\\'
                  OR organization LIKE ?1 ESCAPE '\\')"
            }
        };

        let rows = self
            .conn
            .query(
                &format!(
                    "SELECT {CONTACT_COLUMNS}
                     FROM contacts
                     WHERE is_deleted = 0 AND {filter}
                     ORDER BY display_name COLLATE NOCASE ASC, external_id ASC
                     LIMIT ?2"
                ),
                params![pattern, limit as i64],
            )
            .await?;

        self.collect(rows).await
    }

    async fn count_active(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM contacts WHERE is_deleted = 0")
            .await
    }

    async fn count_total(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM contacts").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    async fn setup() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn ada() -> ContactDraft {
        ContactDraft {
            given_name: Some("Ada".to_string()),
            family_name: Some("Lovelace".to_string()),
            ..ContactDraft::new("people/c1", "Ada Lovelace")
        }
        .with_phone("+441234567890", Some("mobile"))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_creates_then_updates() {
        let db = setup().await;
        let repo = LibSqlContactRepository::new(db.connection());

        let created = repo.upsert(&ada()).await.unwrap();
        assert!(matches!(created, Upserted::Created(_)));

        let mut changed = ada();
        changed.display_name = "Countess Lovelace".to_string();
        changed.phones = vec![ContactPhone::new("+449876543210", None)];
        let updated = repo.upsert(&changed).await.unwrap();
        assert_eq!(updated, Upserted::Updated(created.id()));

        let stored = repo.find_by_external_id("people/c1").await.unwrap().unwrap();
        assert_eq!(stored.display_name, "Countess Lovelace");
        assert_eq!(stored.phones, vec![ContactPhone::new("+449876543210", None)]);
        assert_eq!(repo.count_total().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mark_deleted_keeps_row() {
        let db = setup().await;
        let repo = LibSqlContactRepository::new(db.connection());

        let id = repo.upsert(&ada()).await.unwrap().id();
        repo.mark_deleted(&id).await.unwrap();

        assert_eq!(repo.count_active().await.unwrap(), 0);
        assert_eq!(repo.count_total().await.unwrap(), 1);
        let stored = repo.find_by_external_id("people/c1").await.unwrap().unwrap();
        assert!(stored.is_deleted);
        assert!(repo.list(10, 0).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_upsert_clears_deleted_flag() {
        let db = setup().await;
        let repo = LibSqlContactRepository::new(db.connection());

        let id = repo.upsert(&ada()).await.unwrap().id();
        repo.mark_deleted(&id).await.unwrap();
        repo.upsert(&ada()).await.unwrap();

        assert_eq!(repo.count_active().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mark_deleted_missing_row() {
        let db = setup().await;
        let repo = LibSqlContactRepository::new(db.connection());

        let err = repo.mark_deleted(&ContactId::new()).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_list_sorted_by_name() {
        let db = setup().await;
        let repo = LibSqlContactRepository::new(db.connection());

        repo.upsert(&ContactDraft::new("people/c2", "zed")).await.unwrap();
        repo.upsert(&ContactDraft::new("people/c3", "Bob")).await.unwrap();
        repo.upsert(&ada()).await.unwrap();

        let names: Vec<String> = repo
            .list(10, 0)
            .await
            .unwrap()
            .into_iter()
            .map(|contact| contact.display_name)
            .collect();
        assert_eq!(names, vec!["Ada Lovelace", "Bob", "zed"]);

        let page = repo.list(1, 1).await.unwrap();
        assert_eq!(page[0].display_name, "Bob");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_search_by_text_and_phone() {
        let db = setup().await;
        let repo = LibSqlContactRepository::new(db.connection());

        repo.upsert(&ada()).await.unwrap();
        let mut acme = ContactDraft::new("people/c2", "Road Runner");
        acme.organization = Some("ACME 100%".to_string());
        repo.upsert(&acme.with_phone("+15550100", None)).await.unwrap();

        let by_name = repo.search("lovelace", 10).await.unwrap();
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].external_id, "people/c1");

        let by_org = repo.search("acme", 10).await.unwrap();
        assert_eq!(by_org[0].external_id, "people/c2");

        let literal_percent = repo.search("100%", 10).await.unwrap();
        assert_eq!(literal_percent.len(), 1);

        let by_phone = repo.search("1234 567", 10).await.unwrap();
        assert_eq!(by_phone.len(), 1);
        assert_eq!(by_phone[0].external_id, "people/c1");
        assert_eq!(by_phone[0].phones.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_search_skips_deleted() {
        let db = setup().await;
        let repo = LibSqlContactRepository::new(db.connection());

        let id = repo.upsert(&ada()).await.unwrap().id();
        repo.mark_deleted(&id).await.unwrap();

        assert!(repo.search("Ada", 10).await.unwrap().is_empty());
        assert!(repo.search("441234", 10).await.unwrap().is_empty());
    }
}
