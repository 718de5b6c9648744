//! OpenAI Assistants v2 implementation of the thread bridge

use super::error::{classify_http_error, classify_transport_error};
use super::types::{
    MessageRole, PendingToolCall, Run, RunStatus, ThreadHandle, ThreadMessage,
    ToolOutputSubmission,
};
use super::{AssistantError, ThreadBridge, ToolDefinition};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const ASSISTANT_MODEL: &str = "gpt-4o-mini";

/// Bridge over the OpenAI Assistants API
pub struct OpenAiThreadBridge {
    client: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiThreadBridge {
    pub fn new(api_key: String, base_url: Option<&str>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key,
            base_url: base_url
                .map_or(DEFAULT_BASE_URL, |u| u.trim_end_matches('/'))
                .to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<(reqwest::StatusCode, String), AssistantError> {
        let response = req
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Beta", "assistants=v2")
            .send()
            .await
            .map_err(|e| classify_transport_error(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AssistantError::network(format!("Failed to read response: {e}")))?;
        Ok((status, body))
    }

    async fn request<T: serde::de::DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, AssistantError> {
        let (status, body) = self.send(req).await?;
        if !status.is_success() {
            return Err(classify_http_error(status, &body));
        }
        serde_json::from_str(&body).map_err(|e| {
            AssistantError::unknown(format!("Failed to parse response: {e} - body: {body}"))
        })
    }

    /// Resolve the assistant to use: retrieve the configured id if it still
    /// exists, otherwise create a fresh Leaflet Designer assistant carrying
    /// the instruction text and the given tool definitions.
    pub async fn ensure_assistant(
        &self,
        configured_id: Option<&str>,
        instructions: &str,
        tools: &[ToolDefinition],
    ) -> Result<String, AssistantError> {
        if let Some(id) = configured_id {
            let result: Result<WireAssistant, _> = self
                .request(self.client.get(self.url(&format!("/assistants/{id}"))))
                .await;
            match result {
                Ok(assistant) => return Ok(assistant.id),
                Err(e) => {
                    tracing::warn!(
                        assistant_id = %id,
                        error = %e,
                        "Configured assistant not found, creating a new one"
                    );
                }
            }
        }

        let wire_tools: Vec<Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    }
                })
            })
            .collect();

        let assistant: WireAssistant = self
            .request(
                self.client
                    .post(self.url("/assistants"))
                    .json(&json!({
                        "name": "Leaflet Designer",
                        "instructions": instructions,
                        "model": ASSISTANT_MODEL,
                        "tools": wire_tools,
                    })),
            )
            .await?;

        tracing::info!(assistant_id = %assistant.id, "Created assistant");
        Ok(assistant.id)
    }
}

#[async_trait]
impl ThreadBridge for OpenAiThreadBridge {
    async fn create_thread(&self) -> Result<ThreadHandle, AssistantError> {
        let thread: WireThread = self
            .request(self.client.post(self.url("/threads")).json(&json!({})))
            .await?;
        Ok(ThreadHandle(thread.id))
    }

    async fn append_message(
        &self,
        handle: &ThreadHandle,
        role: MessageRole,
        content: &str,
    ) -> Result<(), AssistantError> {
        let role = match role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };
        let _: WireMessage = self
            .request(
                self.client
                    .post(self.url(&format!("/threads/{}/messages", handle.as_str())))
                    .json(&json!({ "role": role, "content": content })),
            )
            .await?;
        Ok(())
    }

    async fn start_run(
        &self,
        handle: &ThreadHandle,
        assistant_id: &str,
    ) -> Result<Run, AssistantError> {
        let run: WireRun = self
            .request(
                self.client
                    .post(self.url(&format!("/threads/{}/runs", handle.as_str())))
                    .json(&json!({ "assistant_id": assistant_id })),
            )
            .await?;
        Ok(run.into_run())
    }

    async fn retrieve_run(
        &self,
        handle: &ThreadHandle,
        run_id: &str,
    ) -> Result<Run, AssistantError> {
        let run: WireRun = self
            .request(
                self.client
                    .get(self.url(&format!("/threads/{}/runs/{run_id}", handle.as_str()))),
            )
            .await?;
        Ok(run.into_run())
    }

    async fn submit_tool_outputs(
        &self,
        handle: &ThreadHandle,
        run_id: &str,
        outputs: &[ToolOutputSubmission],
    ) -> Result<(), AssistantError> {
        let _: WireRun = self
            .request(
                self.client
                    .post(self.url(&format!(
                        "/threads/{}/runs/{run_id}/submit_tool_outputs",
                        handle.as_str()
                    )))
                    .json(&json!({ "tool_outputs": outputs })),
            )
            .await?;
        Ok(())
    }

    async fn list_messages(
        &self,
        handle: &ThreadHandle,
    ) -> Result<Vec<ThreadMessage>, AssistantError> {
        let list: WireMessageList = self
            .request(
                self.client
                    .get(self.url(&format!("/threads/{}/messages", handle.as_str()))),
            )
            .await?;
        Ok(flatten_messages(list))
    }
}

/// Flatten the wire message list to text messages in chronological order.
/// The API returns newest-first.
fn flatten_messages(list: WireMessageList) -> Vec<ThreadMessage> {
    let mut messages: Vec<ThreadMessage> = list
        .data
        .into_iter()
        .map(|msg| {
            let content = msg
                .content
                .iter()
                .filter_map(|block| match block {
                    WireContentBlock::Text { text } => Some(text.value.as_str()),
                    WireContentBlock::Other => None,
                })
                .collect::<Vec<_>>()
                .join("\n");

            ThreadMessage {
                id: msg.id,
                role: match msg.role.as_str() {
                    "assistant" => MessageRole::Assistant,
                    _ => MessageRole::User,
                },
                content,
                created_at: DateTime::<Utc>::from_timestamp(msg.created_at, 0)
                    .unwrap_or_else(Utc::now),
            }
        })
        .collect();
    messages.reverse();
    messages
}

// Wire types

#[derive(Debug, Deserialize)]
struct WireAssistant {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WireThread {
    id: String,
}

#[derive(Debug, Deserialize)]
struct WireRun {
    id: String,
    status: RunStatus,
    required_action: Option<WireRequiredAction>,
}

impl WireRun {
    fn into_run(self) -> Run {
        let pending_tool_calls = self
            .required_action
            .map(|action| {
                action
                    .submit_tool_outputs
                    .tool_calls
                    .into_iter()
                    .map(|call| PendingToolCall {
                        call_id: call.id,
                        function_name: call.function.name,
                        arguments: call.function.arguments,
                    })
                    .collect()
            })
            .unwrap_or_default();

        Run {
            id: self.id,
            status: self.status,
            pending_tool_calls,
        }
    }
}

#[derive(Debug, Deserialize)]
struct WireRequiredAction {
    submit_tool_outputs: WireSubmitToolOutputs,
}

#[derive(Debug, Deserialize)]
struct WireSubmitToolOutputs {
    tool_calls: Vec<WireToolCall>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    id: String,
    function: WireFunctionCall,
}

#[derive(Debug, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireMessageList {
    data: Vec<WireMessage>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    id: String,
    role: String,
    created_at: i64,
    #[serde(default)]
    content: Vec<WireContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireContentBlock {
    Text { text: WireTextValue },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireTextValue {
    value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_inverted_to_chronological() {
        // Newest-first, as the API delivers them
        let list: WireMessageList = serde_json::from_value(json!({
            "data": [
                {
                    "id": "msg_2",
                    "role": "assistant",
                    "created_at": 1_700_000_100,
                    "content": [{"type": "text", "text": {"value": "Hi! What size?"}}]
                },
                {
                    "id": "msg_1",
                    "role": "user",
                    "created_at": 1_700_000_000,
                    "content": [{"type": "text", "text": {"value": "I need a leaflet"}}]
                }
            ]
        }))
        .unwrap();

        let messages = flatten_messages(list);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "msg_1");
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].id, "msg_2");
        assert!(messages[0].created_at < messages[1].created_at);
    }

    #[test]
    fn test_multi_block_content_joined() {
        let list: WireMessageList = serde_json::from_value(json!({
            "data": [{
                "id": "msg_1",
                "role": "assistant",
                "created_at": 1_700_000_000,
                "content": [
                    {"type": "text", "text": {"value": "line one"}},
                    {"type": "image_file", "image_file": {"file_id": "f1"}},
                    {"type": "text", "text": {"value": "line two"}}
                ]
            }]
        }))
        .unwrap();

        let messages = flatten_messages(list);
        assert_eq!(messages[0].content, "line one\nline two");
    }

    #[test]
    fn test_run_with_required_action() {
        let run: WireRun = serde_json::from_value(json!({
            "id": "run_1",
            "status": "requires_action",
            "required_action": {
                "type": "submit_tool_outputs",
                "submit_tool_outputs": {
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {
                            "name": "generateLeafletImageTool",
                            "arguments": "{\"designData\":{}}"
                        }
                    }]
                }
            }
        }))
        .unwrap();

        let run = run.into_run();
        assert_eq!(run.status, RunStatus::RequiresAction);
        assert_eq!(run.pending_tool_calls.len(), 1);
        assert_eq!(run.pending_tool_calls[0].call_id, "call_1");
        assert_eq!(
            run.pending_tool_calls[0].function_name,
            "generateLeafletImageTool"
        );
    }

    #[test]
    fn test_run_without_action_has_no_calls() {
        let run: WireRun = serde_json::from_value(json!({
            "id": "run_1",
            "status": "completed",
            "required_action": null
        }))
        .unwrap();

        let run = run.into_run();
        assert_eq!(run.status, RunStatus::Completed);
        assert!(run.pending_tool_calls.is_empty());
    }
}
