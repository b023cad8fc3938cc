//! Integration tests driving full conversations through the orchestrator.

use std::sync::Arc;

use serde_json::json;
use tempfile::tempdir;

use markwise_core::{
    FilePayload, OrchestratorEvent, SubmissionStatus, UnifiedInput, UserRole,
};
use markwise_engine::{
    config::EngineConfig,
    mock::{FakeBackend, FakeTransport},
    orchestrator::Orchestrator,
    persistence::{FileStore, MemoryStore, SessionStore},
    variants::FixedPicker,
};

fn orchestrator(
    backend: &FakeBackend,
    transport: &FakeTransport,
    store: Arc<dyn SessionStore>,
    guest: bool,
) -> Orchestrator {
    let config = EngineConfig::new("http://gateway.test", ".");
    Orchestrator::new(
        &config,
        Arc::new(backend.clone()),
        Arc::new(transport.clone()),
        None,
        store,
        guest,
    )
    .with_variant_picker(Box::new(FixedPicker(0)))
}

async fn turn(orchestrator: &mut Orchestrator, input: UnifiedInput) -> Vec<OrchestratorEvent> {
    let (sink, mut drain) = tokio::sync::mpsc::unbounded_channel();
    orchestrator.process_input(input, &sink).await;
    drop(sink);
    let mut events = Vec::new();
    while let Ok(event) = drain.try_recv() {
        events.push(event);
    }
    events
}

/// Let fire-and-forget context injection run on the current-thread runtime.
async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

fn graded_reason_value() -> serde_json::Value {
    json!({
        "score": { "value": "7/10", "label": "Good", "reasoning": "Mostly correct" },
        "feedback": [
            { "type": "strength", "text": "Clean setup" },
            { "type": "gap", "text": "Sign error in step 3" }
        ],
        "insights": [
            { "title": "Negative numbers", "description": "Slips under pressure", "trend": "declining" }
        ],
        "guidance": [],
        "concept_stability": { "status": "unstable_pressure", "evidence": "Fails multi-step items" }
    })
}

/// Test a complete teacher session: introduction, upload, targeted task.
#[tokio::test]
async fn test_teacher_session_full_workflow() {
    let backend = FakeBackend::new()
        .with_perceived_text("2x + 3 = 7, x = 3")
        .with_reason_value(graded_reason_value());
    let transport = FakeTransport::new("gateway")
        .with_reply(["noted"])
        .with_reply(["Worksheet:\n", "1) -3 + 5 = ?"]);
    let store = MemoryStore::new();
    let mut engine = orchestrator(&backend, &transport, Arc::new(store.clone()), false);

    // First contact with no stored profile asks for the role.
    let events = turn(&mut engine, UnifiedInput::from_text("Hello")).await;
    assert!(events[0].as_chunk().unwrap().contains("Teacher or a Student"));
    assert!(matches!(events[1], OrchestratorEvent::TaskComplete));

    // Introduction answers the question and reorients.
    let events = turn(&mut engine, UnifiedInput::from_text("I'm Dana, a teacher")).await;
    assert_eq!(engine.state().user_role, Some(UserRole::Teacher));
    assert!(events[0].as_chunk().unwrap().starts_with("Hello, Dana."));

    // Upload runs the pipeline end to end.
    let upload = UnifiedInput::from_file(FilePayload::new("chen_hw.png", "image/png", vec![1]))
        .with_text("Grade question 3 strictly");
    let events = turn(&mut engine, upload).await;

    let submission = events
        .iter()
        .find_map(|e| match e {
            OrchestratorEvent::SubmissionComplete { submission } => Some(submission),
            _ => None,
        })
        .unwrap();
    assert_eq!(submission.status, SubmissionStatus::Completed);
    assert_eq!(submission.file_name, "chen_hw.png");
    assert_eq!(submission.result.as_ref().unwrap().score.value, "7/10");
    assert_eq!(store.saved_submissions().len(), 1);

    // The accompanying note reached the reasoning prompt.
    let calls = backend.reason_calls();
    assert!(calls[0].prompt.contains("Explicit Instruction: Grade question 3 strictly"));
    assert!(calls[0].prompt.contains("Active Role: Teacher"));

    // The analysis context lands in the chat session before the next task.
    settle().await;
    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert!(requests[0]
        .message
        .starts_with("[SYSTEM UPDATE: LEARNING CONTEXT AVAILABLE]"));

    // A follow-up task streams through the same session, history intact.
    let events = turn(
        &mut engine,
        UnifiedInput::from_text("Generate a worksheet targeting those gaps"),
    )
    .await;
    let streamed: String = events
        .iter()
        .filter_map(OrchestratorEvent::as_chunk)
        .collect();
    assert_eq!(streamed, "Worksheet:\n1) -3 + 5 = ?");
    assert!(events.iter().any(|e| matches!(e, OrchestratorEvent::TaskComplete)));

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[1]
        .message
        .starts_with("[Active user role: Teacher] Generate a worksheet"));
    assert_eq!(requests[1].history.len(), 2);
}

/// Test that a confirmed role survives an engine restart via the file store.
#[tokio::test]
async fn test_profile_survives_restart() {
    let dir = tempdir().unwrap();
    let backend = FakeBackend::new();
    let transport = FakeTransport::new("gateway");

    {
        let store = Arc::new(FileStore::new(dir.path()));
        let mut engine = orchestrator(&backend, &transport, store, false);
        turn(&mut engine, UnifiedInput::from_text("I'm a teacher")).await;
        assert!(engine.state().role_confirmed);
    }
    assert!(dir.path().join(".markwise").join("profile.json").exists());

    // A fresh engine over the same data directory greets as a teacher
    // without re-asking.
    let store = Arc::new(FileStore::new(dir.path()));
    let mut engine = orchestrator(&backend, &transport, store, false);
    let events = turn(&mut engine, UnifiedInput::from_text("hi")).await;

    assert_eq!(engine.state().user_role, Some(UserRole::Teacher));
    let chunk = events[0].as_chunk().unwrap();
    assert!(chunk.contains("As a teacher"));
    assert!(!chunk.contains("Teacher or a Student"));
}

/// Test that insights persisted for a subject feed the next analysis.
#[tokio::test]
async fn test_insight_history_feeds_next_analysis() {
    let dir = tempdir().unwrap();
    let backend = FakeBackend::new()
        .with_perceived_text("fraction work")
        .with_interpretation(markwise_core::InterpretationContext {
            subject: "Math".into(),
            topic: "Fractions".into(),
            ..markwise_core::InterpretationContext::default()
        })
        .with_reason_value(graded_reason_value());
    let transport = FakeTransport::new("gateway");
    let store = Arc::new(FileStore::new(dir.path()));
    let mut engine = orchestrator(&backend, &transport, store, false);

    let first = UnifiedInput::from_file(FilePayload::new("week1.png", "image/png", vec![1]));
    turn(&mut engine, first).await;
    settle().await;

    let second = UnifiedInput::from_file(FilePayload::new("week2.png", "image/png", vec![2]));
    turn(&mut engine, second).await;

    let calls = backend.reason_calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0].prompt.contains("History: None"));
    assert!(calls[1]
        .prompt
        .contains("History: - Negative numbers [declining]: Slips under pressure"));
}

/// Test transparent failover: the fallback carries the whole conversation.
#[tokio::test]
async fn test_fallback_carries_session_history() {
    let primary = FakeTransport::new("primary").failing();
    let fallback = FakeTransport::new("fallback")
        .with_reply(["first reply"])
        .with_reply(["second reply"]);
    let config = EngineConfig::new("http://gateway.test", ".");
    let mut engine = Orchestrator::new(
        &config,
        Arc::new(FakeBackend::new()),
        Arc::new(primary.clone()),
        Some(Arc::new(fallback.clone())),
        Arc::new(MemoryStore::new()),
        true,
    )
    .with_variant_picker(Box::new(FixedPicker(0)));

    let events = turn(&mut engine, UnifiedInput::from_text("generate a quiz")).await;
    assert_eq!(events[0].as_chunk(), Some("first reply"));
    assert!(events.iter().any(|e| matches!(e, OrchestratorEvent::TaskComplete)));

    let events = turn(&mut engine, UnifiedInput::from_text("generate a harder quiz")).await;
    assert_eq!(events[0].as_chunk(), Some("second reply"));

    // Both attempts hit the primary first, then recovered on the fallback
    // with the accumulated history.
    assert_eq!(primary.requests().len(), 2);
    assert_eq!(fallback.requests().len(), 2);
    assert_eq!(fallback.requests()[1].history.len(), 2);
    assert_eq!(fallback.requests()[1].history[1].text, "first reply");
}

/// Test that guest sessions leave no trace in the data directory.
#[tokio::test]
async fn test_guest_session_leaves_no_files() {
    let dir = tempdir().unwrap();
    let backend = FakeBackend::new()
        .with_perceived_text("work")
        .with_reason_value(graded_reason_value());
    let transport = FakeTransport::new("gateway");
    let store = Arc::new(FileStore::new(dir.path()));
    let mut engine = orchestrator(&backend, &transport, store, true);

    turn(&mut engine, UnifiedInput::from_text("I'm a teacher")).await;
    let upload = UnifiedInput::from_file(FilePayload::new("hw.png", "image/png", vec![1]));
    let events = turn(&mut engine, upload).await;
    settle().await;

    assert!(events
        .iter()
        .any(|e| matches!(e, OrchestratorEvent::SubmissionComplete { .. })));
    assert!(!dir.path().join(".markwise").exists());
}

/// Test that every turn type terminates its event sequence exactly once.
#[tokio::test]
async fn test_event_sequences_terminate() {
    let backend = FakeBackend::new()
        .with_perceived_text("work")
        .with_reason_value(json!({}));
    let transport = FakeTransport::new("gateway");
    let mut engine = orchestrator(&backend, &transport, Arc::new(MemoryStore::new()), true);

    let turns = vec![
        UnifiedInput::from_text("Hello"),
        UnifiedInput::from_text("student"),
        UnifiedInput::from_text("generate practice questions"),
        UnifiedInput::from_file(FilePayload::new("hw.png", "image/png", vec![1])),
    ];

    for input in turns {
        let events = turn(&mut engine, input).await;
        let terminators = events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    OrchestratorEvent::TaskComplete
                        | OrchestratorEvent::PhaseUpdate {
                            phase: markwise_core::AnalysisPhase::Complete
                                | markwise_core::AnalysisPhase::Error,
                        }
                )
            })
            .count();
        assert_eq!(terminators, 1, "events: {events:?}");
    }
}
