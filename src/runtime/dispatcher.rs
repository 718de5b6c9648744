//! Tool dispatch
//!
//! The supported tools form a closed enum with typed argument structs,
//! matched exhaustively. An unresolvable name or malformed payload is fatal
//! for the whole request; a handler failure is not — it becomes an
//! error-shaped output the agent can recover from conversationally.

use crate::assistant::{PendingToolCall, ToolOutputSubmission};
use crate::tools::{DesignData, LeafletSynthesisTool, LEAFLET_TOOL_NAME};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Tool {0} is not available")]
    UnknownTool(String),
    #[error("Invalid arguments for tool {name}: {message}")]
    InvalidArguments { name: String, message: String },
}

/// A parsed, validated tool invocation
#[derive(Debug, Clone, PartialEq)]
pub enum ToolRequest {
    GenerateLeaflet { design_data: DesignData },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateLeafletArgs {
    design_data: DesignData,
    /// The agent echoes a conversation id on the wire; the engine supplies
    /// its own, so this is accepted and ignored.
    #[serde(default)]
    #[allow(dead_code)]
    conversation_id: Option<String>,
}

impl ToolRequest {
    /// Resolve a function name and raw argument payload
    pub fn parse(name: &str, arguments: &str) -> Result<Self, DispatchError> {
        match name {
            LEAFLET_TOOL_NAME => {
                let args: GenerateLeafletArgs =
                    serde_json::from_str(arguments).map_err(|e| DispatchError::InvalidArguments {
                        name: name.to_string(),
                        message: e.to_string(),
                    })?;
                Ok(ToolRequest::GenerateLeaflet {
                    design_data: args.design_data,
                })
            }
            other => Err(DispatchError::UnknownTool(other.to_string())),
        }
    }
}

/// Executes a run's pending tool calls and shapes their outputs
pub struct ToolDispatcher {
    leaflet_tool: Arc<LeafletSynthesisTool>,
}

impl ToolDispatcher {
    pub fn new(leaflet_tool: Arc<LeafletSynthesisTool>) -> Self {
        Self { leaflet_tool }
    }

    /// Execute every pending call and collect one output per call.
    ///
    /// All calls are resolved and parsed before any handler runs, so a bad
    /// batch fails fast without partial side effects. Handler errors are
    /// captured as `{"error": ...}` payloads; successes carry
    /// `{"url": ...}`. The caller submits the whole batch at once.
    pub async fn dispatch(
        &self,
        conversation_id: &str,
        owner_id: &str,
        calls: &[PendingToolCall],
    ) -> Result<Vec<ToolOutputSubmission>, DispatchError> {
        let mut parsed = Vec::with_capacity(calls.len());
        for call in calls {
            parsed.push((
                call.call_id.clone(),
                ToolRequest::parse(&call.function_name, &call.arguments)?,
            ));
        }

        let mut outputs = Vec::with_capacity(parsed.len());
        for (call_id, request) in parsed {
            let payload = match request {
                ToolRequest::GenerateLeaflet { design_data } => {
                    match self
                        .leaflet_tool
                        .generate(conversation_id, owner_id, &design_data)
                        .await
                    {
                        Ok(url) => json!({ "url": url }),
                        Err(e) => {
                            tracing::warn!(
                                conversation_id = %conversation_id,
                                call_id = %call_id,
                                error = %e,
                                "Tool handler failed, returning error output to agent"
                            );
                            json!({ "error": e.to_string() })
                        }
                    }
                }
            };
            outputs.push(ToolOutputSubmission {
                tool_call_id: call_id,
                output: payload.to_string(),
            });
        }

        Ok(outputs)
    }
}
