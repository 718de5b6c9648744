//! Mock collaborators for runtime tests

use crate::assistant::{
    AssistantError, MessageRole, Run, ThreadBridge, ThreadHandle, ThreadMessage,
    ToolOutputSubmission,
};
use crate::images::ImageSynthesizer;
use crate::moderation::{ModerationClient, ModerationVerdict};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Scripted thread bridge. `retrieve_run` pops from a queue of run states;
/// every call is appended to an ordered event log so tests can assert
/// sequencing (thread created before append, one submit per request, ...).
#[derive(Default)]
pub struct MockBridge {
    runs: Mutex<VecDeque<Run>>,
    start_status: Mutex<Option<Run>>,
    log: Mutex<Vec<String>>,
    submitted: Mutex<Vec<Vec<ToolOutputSubmission>>>,
    messages: Mutex<Vec<ThreadMessage>>,
    retrieve_count: Mutex<usize>,
}

impl MockBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next `retrieve_run` result
    pub fn push_run(&self, run: Run) {
        self.runs.lock().unwrap().push_back(run);
    }

    /// Set the run returned from `start_run`
    pub fn set_start_run(&self, run: Run) {
        *self.start_status.lock().unwrap() = Some(run);
    }

    pub fn set_messages(&self, messages: Vec<ThreadMessage>) {
        *self.messages.lock().unwrap() = messages;
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<Vec<ToolOutputSubmission>> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn retrieve_count(&self) -> usize {
        *self.retrieve_count.lock().unwrap()
    }

    fn record(&self, event: impl Into<String>) {
        self.log.lock().unwrap().push(event.into());
    }
}

#[async_trait]
impl ThreadBridge for MockBridge {
    async fn create_thread(&self) -> Result<ThreadHandle, AssistantError> {
        self.record("create_thread");
        Ok(ThreadHandle("thread_mock".to_string()))
    }

    async fn append_message(
        &self,
        handle: &ThreadHandle,
        role: MessageRole,
        content: &str,
    ) -> Result<(), AssistantError> {
        self.record(format!(
            "append:{}:{:?}:{content}",
            handle.as_str(),
            role
        ));
        Ok(())
    }

    async fn start_run(
        &self,
        _handle: &ThreadHandle,
        assistant_id: &str,
    ) -> Result<Run, AssistantError> {
        self.record(format!("start_run:{assistant_id}"));
        Ok(self
            .start_status
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Run {
                id: "run_mock".to_string(),
                status: crate::assistant::RunStatus::Queued,
                pending_tool_calls: vec![],
            }))
    }

    async fn retrieve_run(
        &self,
        _handle: &ThreadHandle,
        run_id: &str,
    ) -> Result<Run, AssistantError> {
        self.record(format!("retrieve_run:{run_id}"));
        *self.retrieve_count.lock().unwrap() += 1;
        self.runs
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AssistantError::unknown("MockBridge: no more scripted runs"))
    }

    async fn submit_tool_outputs(
        &self,
        _handle: &ThreadHandle,
        run_id: &str,
        outputs: &[ToolOutputSubmission],
    ) -> Result<(), AssistantError> {
        self.record(format!("submit_tool_outputs:{run_id}:{}", outputs.len()));
        self.submitted.lock().unwrap().push(outputs.to_vec());
        Ok(())
    }

    async fn list_messages(
        &self,
        _handle: &ThreadHandle,
    ) -> Result<Vec<ThreadMessage>, AssistantError> {
        self.record("list_messages");
        Ok(self.messages.lock().unwrap().clone())
    }
}

/// Moderation client returning a fixed verdict
pub struct MockModeration {
    pub verdict: Result<ModerationVerdict, ()>,
}

impl MockModeration {
    pub fn allowing() -> Self {
        Self {
            verdict: Ok(ModerationVerdict::Allowed),
        }
    }

    pub fn flagging() -> Self {
        Self {
            verdict: Ok(ModerationVerdict::Flagged),
        }
    }

    pub fn failing() -> Self {
        Self { verdict: Err(()) }
    }
}

#[async_trait]
impl ModerationClient for MockModeration {
    async fn check(&self, _input: &str) -> Result<ModerationVerdict, AssistantError> {
        self.verdict
            .map_err(|()| AssistantError::network("moderation unreachable"))
    }
}

/// Image synthesizer returning a fixed result
pub struct MockImages {
    pub result: Result<String, String>,
}

impl MockImages {
    pub fn returning(url: &str) -> Self {
        Self {
            result: Ok(url.to_string()),
        }
    }

    pub fn erroring(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
        }
    }
}

#[async_trait]
impl ImageSynthesizer for MockImages {
    async fn generate(&self, _prompt: &str, _size: &str) -> Result<String, AssistantError> {
        self.result
            .clone()
            .map_err(AssistantError::server_error)
    }
}
