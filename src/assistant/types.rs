//! Agent thread and run types, independent of the backing vendor

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque reference to an external agent thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadHandle(pub String);

impl ThreadHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Role of a thread message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A message in the external thread, already flattened to text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Status of an asynchronous agent run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    Cancelling,
    RequiresAction,
    Completed,
    Failed,
    Cancelled,
    Expired,
    Incomplete,
}

impl RunStatus {
    /// Still executing; keep polling
    pub fn is_pending(self) -> bool {
        matches!(
            self,
            RunStatus::Queued | RunStatus::InProgress | RunStatus::Cancelling
        )
    }

    /// Terminal failure group
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            RunStatus::Failed | RunStatus::Cancelled | RunStatus::Expired | RunStatus::Incomplete
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::InProgress => "in_progress",
            RunStatus::Cancelling => "cancelling",
            RunStatus::RequiresAction => "requires_action",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Expired => "expired",
            RunStatus::Incomplete => "incomplete",
        }
    }
}

/// A tool invocation the agent is waiting on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingToolCall {
    pub call_id: String,
    pub function_name: String,
    /// Raw JSON argument string as the agent produced it
    pub arguments: String,
}

/// One run of the agent against a thread
#[derive(Debug, Clone)]
pub struct Run {
    pub id: String,
    pub status: RunStatus,
    /// Populated when status is `requires_action`
    pub pending_tool_calls: Vec<PendingToolCall>,
}

/// Result fed back to the agent for one tool call
#[derive(Debug, Clone, Serialize)]
pub struct ToolOutputSubmission {
    pub tool_call_id: String,
    /// JSON-encoded payload: `{"url": ...}` on success, `{"error": ...}`
    /// when the handler failed
    pub output: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_and_failure_sets_are_disjoint() {
        let all = [
            RunStatus::Queued,
            RunStatus::InProgress,
            RunStatus::Cancelling,
            RunStatus::RequiresAction,
            RunStatus::Completed,
            RunStatus::Failed,
            RunStatus::Cancelled,
            RunStatus::Expired,
            RunStatus::Incomplete,
        ];
        for status in all {
            assert!(!(status.is_pending() && status.is_failure()), "{status:?}");
        }
        assert!(!RunStatus::RequiresAction.is_pending());
        assert!(!RunStatus::Completed.is_failure());
    }

    #[test]
    fn run_status_deserializes_from_wire_names() {
        let s: RunStatus = serde_json::from_str("\"requires_action\"").unwrap();
        assert_eq!(s, RunStatus::RequiresAction);
        let s: RunStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(s, RunStatus::InProgress);
    }
}
