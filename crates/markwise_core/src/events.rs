//! Lifecycle events emitted by the orchestrator and rendered by callers.

use serde::{Deserialize, Serialize};

use crate::types::{AnalysisPhase, Submission};

/// One emission in a turn's ordered event sequence.
///
/// Every turn terminates in exactly one of: `TaskComplete` (optionally
/// followed by `FollowUp`), `PhaseUpdate(Error)` preceded by `Error`, or
/// `PhaseUpdate(Complete)` preceded by `SubmissionComplete` (optionally
/// followed by `FollowUp`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrchestratorEvent {
    /// A fragment of streamed reply text, in arrival order.
    StreamChunk { text: String },
    /// The analysis pipeline moved to a new phase.
    PhaseUpdate { phase: AnalysisPhase },
    /// A submission finished, carrying its assembled result.
    SubmissionComplete { submission: Box<Submission> },
    /// Role-aware follow-up suggestion, emitted after completion.
    FollowUp { text: String },
    /// The turn finished without pipeline work.
    TaskComplete,
    /// The turn failed; the message is human-readable.
    Error { message: String },
}

impl OrchestratorEvent {
    pub fn chunk(text: impl Into<String>) -> Self {
        OrchestratorEvent::StreamChunk { text: text.into() }
    }

    pub fn follow_up(text: impl Into<String>) -> Self {
        OrchestratorEvent::FollowUp { text: text.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        OrchestratorEvent::Error {
            message: message.into(),
        }
    }

    /// The streamed text, when this is a chunk event.
    pub fn as_chunk(&self) -> Option<&str> {
        match self {
            OrchestratorEvent::StreamChunk { text } => Some(text),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = OrchestratorEvent::chunk("Hello");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "STREAM_CHUNK");
        assert_eq!(json["text"], "Hello");

        let event = OrchestratorEvent::TaskComplete;
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "TASK_COMPLETE");

        let event = OrchestratorEvent::PhaseUpdate {
            phase: AnalysisPhase::Error,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["phase"], "ERROR");

        let event = OrchestratorEvent::error("boom");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["message"], "boom");
    }

    #[test]
    fn test_as_chunk() {
        assert_eq!(OrchestratorEvent::chunk("hi").as_chunk(), Some("hi"));
        assert!(OrchestratorEvent::TaskComplete.as_chunk().is_none());
    }
}
