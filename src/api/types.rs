//! API request and response types

use crate::assistant::ThreadMessage;
use crate::runtime::RequestStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request to send a chat message, optionally into an existing conversation.
/// `message` is optional at the serde level so a missing field surfaces as
/// a 400 from the handler rather than an extractor rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Query parameters for conversation retrieval
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationQuery {
    pub conversation_id: Option<String>,
}

/// Response for a handled chat message
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub conversation_id: String,
    pub status: RequestStatus,
    pub run_id: String,
}

/// One message in a conversation snapshot
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub id: String,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<ThreadMessage> for MessageView {
    fn from(m: ThreadMessage) -> Self {
        Self {
            id: m.id,
            role: match m.role {
                crate::assistant::MessageRole::User => "user".to_string(),
                crate::assistant::MessageRole::Assistant => "assistant".to_string(),
            },
            content: m.content,
            created_at: m.created_at,
        }
    }
}

/// Response for conversation retrieval
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub status: String,
    pub messages: Vec<MessageView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leaflet_url: Option<String>,
}

/// Response for the clear action
#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub success: bool,
    pub deleted: usize,
}

/// Error body returned for every non-2xx response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
