//! Conversation engine
//!
//! One sequential control flow per inbound request. The store has no
//! version column, so concurrent requests against the same conversation id
//! serialize on a per-id mutex instead of interleaving writes.

use super::dispatcher::ToolDispatcher;
use super::poller::{PollError, PollOutcome, RunPoller};
use crate::assistant::{MessageRole, ThreadBridge, ThreadHandle, ThreadMessage};
use crate::db::{Conversation, ConversationStore, DbError};
use crate::moderation::{ModerationError, ModerationGate};
use crate::state_machine::{transition, Status, StatusEvent};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// How a POST resolved, reported to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// The run finished; the client should fetch the latest messages
    Completed,
    /// Tool outputs were submitted; the agent is continuing
    ToolExecuted,
}

/// Result of handling one inbound message
#[derive(Debug)]
pub struct ChatOutcome {
    pub conversation_id: String,
    pub status: RequestStatus,
    pub run_id: String,
}

/// Read-only view of a conversation for the client
#[derive(Debug)]
pub struct ConversationView {
    pub status: Status,
    pub messages: Vec<ThreadMessage>,
    pub leaflet_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum EngineError {
    /// Client-facing rejection, no state mutated
    #[error("{0}")]
    Rejected(String),
    #[error("Conversation not found: {0}")]
    NotFound(String),
    /// Run- or service-level failure; the request fails
    #[error("{0}")]
    Infra(String),
}

/// Per-conversation mutual exclusion
#[derive(Default)]
struct ConversationLocks {
    inner: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl ConversationLocks {
    fn for_id(&self, id: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.inner
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .clone()
    }

    /// Drop the map entry once no request holds a clone, so the map only
    /// ever tracks in-flight conversations.
    fn release(&self, id: &str) {
        let mut map = self.inner.lock().unwrap();
        if map.get(id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }
}

/// Orchestrates the full lifecycle of a conversation request
pub struct ConversationEngine {
    store: ConversationStore,
    bridge: Arc<dyn ThreadBridge>,
    gate: ModerationGate,
    dispatcher: ToolDispatcher,
    poller: RunPoller,
    locks: ConversationLocks,
    assistant_id: String,
    /// Root token cancelled on process shutdown; every request polls under
    /// a child of it
    shutdown: CancellationToken,
}

impl ConversationEngine {
    pub fn new(
        store: ConversationStore,
        bridge: Arc<dyn ThreadBridge>,
        gate: ModerationGate,
        dispatcher: ToolDispatcher,
        poller: RunPoller,
        assistant_id: String,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            bridge,
            gate,
            dispatcher,
            poller,
            locks: ConversationLocks::default(),
            assistant_id,
            shutdown,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Handle one inbound user message: moderate, find-or-create the
    /// conversation, append to the thread, run the agent and resolve the
    /// run, dispatching tools if requested.
    pub async fn handle_message(
        &self,
        owner_id: &str,
        conversation_id: Option<&str>,
        message: &str,
    ) -> Result<ChatOutcome, EngineError> {
        // Moderation runs before any store mutation
        self.gate.screen(message).await.map_err(|e| match e {
            ModerationError::Flagged => {
                EngineError::Rejected("Message was flagged by moderation".to_string())
            }
            ModerationError::Service(inner) => EngineError::Infra(inner.to_string()),
        })?;

        // Find-or-create; an id that does not resolve for this owner starts
        // a fresh conversation rather than leaking its existence
        let conversation = match conversation_id {
            Some(id) => self.store.find_owned(id, owner_id).ok(),
            None => None,
        };
        let conversation = match conversation {
            Some(c) => c,
            None => self
                .store
                .create(owner_id)
                .map_err(|e| EngineError::Infra(e.to_string()))?,
        };
        let conversation_id = conversation.id;

        let lock = self.locks.for_id(&conversation_id);
        let result = {
            let _guard = lock.lock().await;
            self.run_exchange(&conversation_id, owner_id, message).await
        };
        drop(lock);
        self.locks.release(&conversation_id);
        result
    }

    /// One exchange under the per-conversation lock. The record is re-read
    /// here: the snapshot taken before lock acquisition may predate another
    /// request's thread bind.
    async fn run_exchange(
        &self,
        conversation_id: &str,
        owner_id: &str,
        message: &str,
    ) -> Result<ChatOutcome, EngineError> {
        let conversation = self
            .store
            .find_owned(conversation_id, owner_id)
            .map_err(|e| EngineError::Infra(e.to_string()))?;

        let handle = self.ensure_thread(&conversation, owner_id).await?;

        self.bridge
            .append_message(&handle, MessageRole::User, message)
            .await
            .map_err(|e| EngineError::Infra(e.to_string()))?;

        let run = self
            .bridge
            .start_run(&handle, &self.assistant_id)
            .await
            .map_err(|e| EngineError::Infra(e.to_string()))?;
        let run_id = run.id.clone();

        tracing::info!(
            conversation_id = %conversation.id,
            run_id = %run_id,
            "Run started"
        );

        let cancel = self.shutdown.child_token();
        let outcome = self
            .poller
            .drive(self.bridge.as_ref(), &handle, run, &cancel)
            .await;

        match outcome {
            Ok(PollOutcome::Completed) => {
                self.advance_status(&conversation.id, owner_id, StatusEvent::RunCompleted)?;
                Ok(ChatOutcome {
                    conversation_id: conversation.id,
                    status: RequestStatus::Completed,
                    run_id,
                })
            }
            Ok(PollOutcome::RequiresAction(calls)) => {
                if calls.is_empty() {
                    self.mark_failed(&conversation.id, owner_id);
                    return Err(EngineError::Infra(
                        "Run requires action, but no tool calls were found".to_string(),
                    ));
                }
                match self
                    .dispatcher
                    .dispatch(&conversation.id, owner_id, &calls)
                    .await
                {
                    Ok(outputs) => {
                        self.bridge
                            .submit_tool_outputs(&handle, &run_id, &outputs)
                            .await
                            .map_err(|e| EngineError::Infra(e.to_string()))?;
                        Ok(ChatOutcome {
                            conversation_id: conversation.id,
                            status: RequestStatus::ToolExecuted,
                            run_id,
                        })
                    }
                    Err(e) => {
                        self.mark_failed(&conversation.id, owner_id);
                        Err(EngineError::Infra(e.to_string()))
                    }
                }
            }
            Ok(PollOutcome::Failed(status)) => {
                self.mark_failed(&conversation.id, owner_id);
                Err(EngineError::Infra(format!(
                    "Run failed with status: {}",
                    status.as_str()
                )))
            }
            Err(e @ (PollError::DeadlineExceeded { .. } | PollError::Cancelled(_))) => {
                self.mark_failed(&conversation.id, owner_id);
                Err(EngineError::Infra(e.to_string()))
            }
            Err(PollError::Bridge(e)) => {
                self.mark_failed(&conversation.id, owner_id);
                Err(EngineError::Infra(e.to_string()))
            }
        }
    }

    /// Read-only snapshot: stored status plus messages re-derived from the
    /// external thread, chronological ascending.
    pub async fn snapshot(
        &self,
        owner_id: &str,
        conversation_id: &str,
    ) -> Result<ConversationView, EngineError> {
        let conversation = self
            .store
            .find_owned(conversation_id, owner_id)
            .map_err(|e| match e {
                DbError::ConversationNotFound(id) => EngineError::NotFound(id),
                other => EngineError::Infra(other.to_string()),
            })?;

        let messages = match &conversation.thread_id {
            Some(thread_id) => self
                .bridge
                .list_messages(&ThreadHandle(thread_id.clone()))
                .await
                .map_err(|e| EngineError::Infra(e.to_string()))?,
            None => Vec::new(),
        };

        Ok(ConversationView {
            status: conversation.status,
            messages,
            leaflet_url: conversation.leaflet_url,
        })
    }

    /// Delete every conversation the owner has
    pub fn clear_owner(&self, owner_id: &str) -> Result<usize, EngineError> {
        self.store
            .delete_all_for_owner(owner_id)
            .map_err(|e| EngineError::Infra(e.to_string()))
    }

    /// Bind a thread handle before the first message is appended
    async fn ensure_thread(
        &self,
        conversation: &Conversation,
        owner_id: &str,
    ) -> Result<ThreadHandle, EngineError> {
        if let Some(thread_id) = &conversation.thread_id {
            return Ok(ThreadHandle(thread_id.clone()));
        }

        let handle = self
            .bridge
            .create_thread()
            .await
            .map_err(|e| EngineError::Infra(e.to_string()))?;
        self.store
            .set_thread_handle(&conversation.id, owner_id, handle.as_str())
            .map_err(|e| EngineError::Infra(e.to_string()))?;
        Ok(handle)
    }

    fn advance_status(
        &self,
        conversation_id: &str,
        owner_id: &str,
        event: StatusEvent,
    ) -> Result<(), EngineError> {
        let current = self
            .store
            .find_owned(conversation_id, owner_id)
            .map_err(|e| EngineError::Infra(e.to_string()))?
            .status;
        self.store
            .set_status(conversation_id, owner_id, transition(current, event))
            .map_err(|e| EngineError::Infra(e.to_string()))
    }

    /// Force the conversation into `failed`; best-effort, the original
    /// error is what the caller reports.
    fn mark_failed(&self, conversation_id: &str, owner_id: &str) {
        if let Err(e) = self
            .store
            .set_status(conversation_id, owner_id, Status::Failed)
        {
            tracing::error!(
                conversation_id = %conversation_id,
                error = %e,
                "Failed to mark conversation as failed"
            );
        }
    }
}
