//! Conversation orchestration runtime
//!
//! Drives one inbound request end-to-end: moderation, store find-or-create,
//! thread append, run start, bounded polling, tool dispatch, tool-output
//! submission.

mod dispatcher;
mod engine;
mod poller;

#[cfg(test)]
pub mod testing;

pub use dispatcher::{DispatchError, ToolDispatcher, ToolRequest};
pub use engine::{ChatOutcome, ConversationEngine, ConversationView, EngineError, RequestStatus};
pub use poller::{PollError, PollOutcome, PollPolicy, RunPoller};
