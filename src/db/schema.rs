//! Database schema and record types

pub use crate::state_machine::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS conversations (
    id TEXT PRIMARY KEY,
    owner_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'gathering_info',
    thread_id TEXT,
    leaflet_url TEXT,
    design_data TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_owner ON conversations(owner_id);
";

/// Conversation record
///
/// Every read and write is scoped by `owner_id`; a lookup against a
/// foreign owner behaves like not-found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub owner_id: String,
    pub status: Status,
    /// External agent thread handle; absent until the first run, set once
    pub thread_id: Option<String>,
    /// Generated leaflet URL; non-null exactly when status is `completed`
    pub leaflet_url: Option<String>,
    /// Last design parameters the synthesis tool committed
    pub design_data: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
