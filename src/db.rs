//! Conversation store
//!
//! Owner-scoped persistence for conversation records. The handle is opened
//! once at startup and cloned into the application state; connections are
//! serialized behind a mutex.

mod schema;

pub use schema::*;

use crate::state_machine::Status;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),
    #[error("Thread handle already set for conversation: {0}")]
    ThreadHandleSet(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe store handle
#[derive(Clone)]
pub struct ConversationStore {
    conn: Arc<Mutex<Connection>>,
}

impl ConversationStore {
    /// Open or create the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Create a new conversation for the given owner
    pub fn create(&self, owner_id: &str) -> DbResult<Conversation> {
        let conn = self.conn.lock().unwrap();
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO conversations (id, owner_id, status, created_at, updated_at)
             VALUES (?1, ?2, 'gathering_info', ?3, ?3)",
            params![id, owner_id, now.to_rfc3339()],
        )?;

        Ok(Conversation {
            id,
            owner_id: owner_id.to_string(),
            status: Status::GatheringInfo,
            thread_id: None,
            leaflet_url: None,
            design_data: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Look up a conversation by id, scoped to its owner.
    ///
    /// A foreign-owned id returns `ConversationNotFound`, indistinguishable
    /// from an id that never existed.
    pub fn find_owned(&self, id: &str, owner_id: &str) -> DbResult<Conversation> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, status, thread_id, leaflet_url, design_data, created_at, updated_at
             FROM conversations WHERE id = ?1 AND owner_id = ?2",
        )?;

        stmt.query_row(params![id, owner_id], row_to_conversation)
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    DbError::ConversationNotFound(id.to_string())
                }
                other => DbError::Sqlite(other),
            })
    }

    /// Bind the external thread handle. The handle is set at most once;
    /// a second bind is an error rather than a silent overwrite.
    pub fn set_thread_handle(&self, id: &str, owner_id: &str, thread_id: &str) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        let updated = conn.execute(
            "UPDATE conversations SET thread_id = ?1, updated_at = ?2
             WHERE id = ?3 AND owner_id = ?4 AND thread_id IS NULL",
            params![thread_id, now.to_rfc3339(), id, owner_id],
        )?;

        if updated == 0 {
            let exists: Option<String> = conn
                .query_row(
                    "SELECT thread_id FROM conversations WHERE id = ?1 AND owner_id = ?2",
                    params![id, owner_id],
                    |row| row.get(0),
                )
                .optional()?
                .flatten();
            return match exists {
                Some(_) => Err(DbError::ThreadHandleSet(id.to_string())),
                None => Err(DbError::ConversationNotFound(id.to_string())),
            };
        }
        Ok(())
    }

    /// Update conversation status.
    ///
    /// `leaflet_url` is non-null exactly when the status is `completed`, so
    /// moving to any other status clears it in the same statement.
    pub fn set_status(&self, id: &str, owner_id: &str, status: Status) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        let updated = conn.execute(
            "UPDATE conversations
             SET status = ?1,
                 leaflet_url = CASE WHEN ?1 = 'completed' THEN leaflet_url ELSE NULL END,
                 updated_at = ?2
             WHERE id = ?3 AND owner_id = ?4",
            params![status.as_str(), now.to_rfc3339(), id, owner_id],
        )?;

        if updated == 0 {
            return Err(DbError::ConversationNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Commit a generated leaflet: URL, design data and `completed` status
    /// are written together so the url/status invariant holds.
    pub fn set_leaflet_result(
        &self,
        id: &str,
        owner_id: &str,
        leaflet_url: &str,
        design_data: &serde_json::Value,
    ) -> DbResult<()> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();
        let design_str = serde_json::to_string(design_data).unwrap_or_else(|_| "{}".to_string());

        let updated = conn.execute(
            "UPDATE conversations
             SET leaflet_url = ?1, design_data = ?2, status = 'completed', updated_at = ?3
             WHERE id = ?4 AND owner_id = ?5",
            params![leaflet_url, design_str, now.to_rfc3339(), id, owner_id],
        )?;

        if updated == 0 {
            return Err(DbError::ConversationNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Delete every conversation owned by the caller. Returns the number
    /// of deleted rows.
    pub fn delete_all_for_owner(&self, owner_id: &str) -> DbResult<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM conversations WHERE owner_id = ?1",
            params![owner_id],
        )?;
        Ok(deleted)
    }

    /// Count conversations for an owner (test and admin support)
    pub fn count_for_owner(&self, owner_id: &str) -> DbResult<i64> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT COUNT(*) FROM conversations WHERE owner_id = ?1",
            params![owner_id],
            |row| row.get(0),
        )
        .map_err(DbError::from)
    }
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        status: Status::parse(row.get::<_, String>(2)?.as_str()).unwrap_or_default(),
        thread_id: row.get(3)?,
        leaflet_url: row.get(4)?,
        design_data: row
            .get::<_, Option<String>>(5)?
            .and_then(|s| serde_json::from_str(&s).ok()),
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_and_find() {
        let store = ConversationStore::open_in_memory().unwrap();

        let conv = store.create("user-1").unwrap();
        assert_eq!(conv.status, Status::GatheringInfo);
        assert!(conv.thread_id.is_none());
        assert!(conv.leaflet_url.is_none());

        let fetched = store.find_owned(&conv.id, "user-1").unwrap();
        assert_eq!(fetched.id, conv.id);
        assert_eq!(fetched.owner_id, "user-1");
    }

    #[test]
    fn test_foreign_owner_looks_like_not_found() {
        let store = ConversationStore::open_in_memory().unwrap();
        let conv = store.create("user-1").unwrap();

        let err = store.find_owned(&conv.id, "user-2").unwrap_err();
        let missing = store.find_owned("no-such-id", "user-2").unwrap_err();
        assert!(matches!(err, DbError::ConversationNotFound(_)));
        assert!(matches!(missing, DbError::ConversationNotFound(_)));
    }

    #[test]
    fn test_thread_handle_set_once() {
        let store = ConversationStore::open_in_memory().unwrap();
        let conv = store.create("user-1").unwrap();

        store
            .set_thread_handle(&conv.id, "user-1", "thread_abc")
            .unwrap();
        let fetched = store.find_owned(&conv.id, "user-1").unwrap();
        assert_eq!(fetched.thread_id.as_deref(), Some("thread_abc"));

        let err = store
            .set_thread_handle(&conv.id, "user-1", "thread_other")
            .unwrap_err();
        assert!(matches!(err, DbError::ThreadHandleSet(_)));

        // Original handle untouched
        let fetched = store.find_owned(&conv.id, "user-1").unwrap();
        assert_eq!(fetched.thread_id.as_deref(), Some("thread_abc"));
    }

    #[test]
    fn test_thread_handle_foreign_owner_rejected() {
        let store = ConversationStore::open_in_memory().unwrap();
        let conv = store.create("user-1").unwrap();

        let err = store
            .set_thread_handle(&conv.id, "user-2", "thread_abc")
            .unwrap_err();
        assert!(matches!(err, DbError::ConversationNotFound(_)));
    }

    #[test]
    fn test_leaflet_result_sets_url_and_status_together() {
        let store = ConversationStore::open_in_memory().unwrap();
        let conv = store.create("user-1").unwrap();

        store
            .set_leaflet_result(
                &conv.id,
                "user-1",
                "https://img.example/leaflet.png",
                &json!({"purpose": "Bake sale"}),
            )
            .unwrap();

        let fetched = store.find_owned(&conv.id, "user-1").unwrap();
        assert_eq!(fetched.status, Status::Completed);
        assert_eq!(
            fetched.leaflet_url.as_deref(),
            Some("https://img.example/leaflet.png")
        );
        assert_eq!(fetched.design_data.unwrap()["purpose"], "Bake sale");
    }

    #[test]
    fn test_set_status() {
        let store = ConversationStore::open_in_memory().unwrap();
        let conv = store.create("user-1").unwrap();

        store.set_status(&conv.id, "user-1", Status::Failed).unwrap();
        let fetched = store.find_owned(&conv.id, "user-1").unwrap();
        assert_eq!(fetched.status, Status::Failed);

        let err = store
            .set_status("missing", "user-1", Status::InChat)
            .unwrap_err();
        assert!(matches!(err, DbError::ConversationNotFound(_)));
    }

    #[test]
    fn test_leaving_completed_clears_leaflet_url() {
        let store = ConversationStore::open_in_memory().unwrap();
        let conv = store.create("user-1").unwrap();

        store
            .set_leaflet_result(
                &conv.id,
                "user-1",
                "https://img.example/leaflet.png",
                &json!({"purpose": "Bake sale"}),
            )
            .unwrap();

        store.set_status(&conv.id, "user-1", Status::Failed).unwrap();
        let fetched = store.find_owned(&conv.id, "user-1").unwrap();
        assert_eq!(fetched.status, Status::Failed);
        assert!(fetched.leaflet_url.is_none());
        // Design parameters are the last ones submitted, not part of the
        // url/status invariant
        assert!(fetched.design_data.is_some());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conversations.db");

        let id = {
            let store = ConversationStore::open(&path).unwrap();
            let conv = store.create("user-1").unwrap();
            store
                .set_thread_handle(&conv.id, "user-1", "thread_abc")
                .unwrap();
            conv.id
        };

        let store = ConversationStore::open(&path).unwrap();
        let fetched = store.find_owned(&id, "user-1").unwrap();
        assert_eq!(fetched.thread_id.as_deref(), Some("thread_abc"));
        assert_eq!(fetched.status, Status::GatheringInfo);
    }

    #[test]
    fn test_delete_all_for_owner_scoped() {
        let store = ConversationStore::open_in_memory().unwrap();
        store.create("user-1").unwrap();
        store.create("user-1").unwrap();
        let other = store.create("user-2").unwrap();

        let deleted = store.delete_all_for_owner("user-1").unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(store.count_for_owner("user-1").unwrap(), 0);

        // Other owners untouched
        assert!(store.find_owned(&other.id, "user-2").is_ok());
    }
}
