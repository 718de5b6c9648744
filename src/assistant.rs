//! External conversational-agent abstraction
//!
//! `ThreadBridge` adapts the vendor's thread/run primitives behind a trait
//! so the orchestration engine can be exercised against a mock in tests.

pub(crate) mod error;
mod openai;
mod types;

pub use error::{AssistantError, AssistantErrorKind};
pub use openai::OpenAiThreadBridge;
pub use types::*;

use async_trait::async_trait;
use serde_json::Value;

/// A tool definition advertised to the agent
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Adapter contract over the agent's thread/run primitives
#[async_trait]
pub trait ThreadBridge: Send + Sync {
    /// Create a new thread
    async fn create_thread(&self) -> Result<ThreadHandle, AssistantError>;

    /// Append a message to a thread
    async fn append_message(
        &self,
        handle: &ThreadHandle,
        role: MessageRole,
        content: &str,
    ) -> Result<(), AssistantError>;

    /// Start an asynchronous run of the agent against a thread
    async fn start_run(
        &self,
        handle: &ThreadHandle,
        assistant_id: &str,
    ) -> Result<Run, AssistantError>;

    /// Fetch the current state of a run
    async fn retrieve_run(
        &self,
        handle: &ThreadHandle,
        run_id: &str,
    ) -> Result<Run, AssistantError>;

    /// Submit tool outputs for a run awaiting action
    async fn submit_tool_outputs(
        &self,
        handle: &ThreadHandle,
        run_id: &str,
        outputs: &[ToolOutputSubmission],
    ) -> Result<(), AssistantError>;

    /// List all thread messages in chronological (ascending) order.
    ///
    /// The vendor returns newest-first; implementations must invert it.
    async fn list_messages(
        &self,
        handle: &ThreadHandle,
    ) -> Result<Vec<ThreadMessage>, AssistantError>;
}

/// Configuration for the agent vendor
#[derive(Debug, Clone, Default)]
pub struct AssistantConfig {
    pub api_key: String,
    /// Reuse an existing assistant if set and resolvable
    pub assistant_id: Option<String>,
    /// Override the API base URL (tests, proxies)
    pub base_url: Option<String>,
}

impl AssistantConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            assistant_id: std::env::var("OPENAI_ASSISTANT_ID").ok(),
            base_url: std::env::var("OPENAI_BASE_URL").ok(),
        }
    }
}
