//! Conversation lifecycle state machine
//!
//! Pure transition function over persisted statuses. The client keeps a
//! couple of presentation-only states (initial form, generic error) that
//! never reach the store and therefore do not appear here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Persisted conversation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Conversation created, agent still collecting requirements
    #[default]
    GatheringInfo,
    /// At least one run finished without needing a tool
    InChat,
    /// Synthesis tool invoked, image call in flight
    Designing,
    /// Leaflet generated and stored (terminal success)
    Completed,
    /// Run- or tool-registry-level infrastructure failure (terminal)
    Failed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Completed | Status::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Status::GatheringInfo => "gathering_info",
            Status::InChat => "in_chat",
            Status::Designing => "designing",
            Status::Completed => "completed",
            Status::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "gathering_info" => Some(Status::GatheringInfo),
            "in_chat" => Some(Status::InChat),
            "designing" => Some(Status::Designing),
            "completed" => Some(Status::Completed),
            "failed" => Some(Status::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle events that move a conversation between statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusEvent {
    /// A run reached `completed` without requesting a tool
    RunCompleted,
    /// The synthesis tool was dispatched (before the image call returns)
    SynthesisStarted,
    /// The synthesis tool committed a leaflet URL
    SynthesisSucceeded,
    /// The synthesis tool's image call or commit failed
    SynthesisFailed,
    /// A run ended in the terminal failure group, or dispatch was fatal
    RunFailed,
}

/// Apply an event to a status. Total: terminal statuses absorb
/// `RunCompleted` (a run finishing after synthesis must not demote
/// `completed` back to `in_chat`).
pub fn transition(status: Status, event: StatusEvent) -> Status {
    match event {
        StatusEvent::RunCompleted => {
            if status.is_terminal() {
                status
            } else {
                Status::InChat
            }
        }
        StatusEvent::SynthesisStarted => Status::Designing,
        StatusEvent::SynthesisSucceeded => Status::Completed,
        StatusEvent::SynthesisFailed | StatusEvent::RunFailed => Status::Failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn run_completed_moves_to_in_chat() {
        assert_eq!(
            transition(Status::GatheringInfo, StatusEvent::RunCompleted),
            Status::InChat
        );
        assert_eq!(
            transition(Status::InChat, StatusEvent::RunCompleted),
            Status::InChat
        );
    }

    #[test]
    fn run_completed_preserves_terminal_statuses() {
        assert_eq!(
            transition(Status::Completed, StatusEvent::RunCompleted),
            Status::Completed
        );
        assert_eq!(
            transition(Status::Failed, StatusEvent::RunCompleted),
            Status::Failed
        );
    }

    #[test]
    fn synthesis_path() {
        let s = transition(Status::GatheringInfo, StatusEvent::SynthesisStarted);
        assert_eq!(s, Status::Designing);
        assert_eq!(
            transition(s, StatusEvent::SynthesisSucceeded),
            Status::Completed
        );
    }

    #[test]
    fn failures_are_failed() {
        assert_eq!(
            transition(Status::Designing, StatusEvent::SynthesisFailed),
            Status::Failed
        );
        assert_eq!(
            transition(Status::InChat, StatusEvent::RunFailed),
            Status::Failed
        );
    }

    #[test]
    fn round_trips_through_strings() {
        for s in [
            Status::GatheringInfo,
            Status::InChat,
            Status::Designing,
            Status::Completed,
            Status::Failed,
        ] {
            assert_eq!(Status::parse(s.as_str()), Some(s));
        }
        assert_eq!(Status::parse("awaiting_form"), None);
    }

    fn any_status() -> impl Strategy<Value = Status> {
        prop_oneof![
            Just(Status::GatheringInfo),
            Just(Status::InChat),
            Just(Status::Designing),
            Just(Status::Completed),
            Just(Status::Failed),
        ]
    }

    fn any_event() -> impl Strategy<Value = StatusEvent> {
        prop_oneof![
            Just(StatusEvent::RunCompleted),
            Just(StatusEvent::SynthesisStarted),
            Just(StatusEvent::SynthesisSucceeded),
            Just(StatusEvent::SynthesisFailed),
            Just(StatusEvent::RunFailed),
        ]
    }

    proptest! {
        // A failed conversation can only leave `failed` through a fresh
        // synthesis attempt, never by a run completing.
        #[test]
        fn failed_never_becomes_in_chat(event in any_event()) {
            let next = transition(Status::Failed, event);
            prop_assert_ne!(next, Status::InChat);
        }

        // `completed` is only reachable through synthesis success.
        #[test]
        fn completed_requires_synthesis_success(
            status in any_status(),
            event in any_event(),
        ) {
            let next = transition(status, event);
            if next == Status::Completed {
                prop_assert!(
                    event == StatusEvent::SynthesisSucceeded
                        || status == Status::Completed
                );
            }
        }
    }
}
