//! Turn orchestration.
//!
//! The [`Orchestrator`] is the single authority for intent detection and
//! pipeline routing: one call to [`Orchestrator::process_input`] consumes one
//! user turn and pushes an ordered, finite sequence of events into the
//! caller's sink. Callers drain the events fully before submitting the next
//! turn; `SessionState` is unsynchronized by design and assumes at most one
//! in-flight turn per session.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use markwise_core::{
    AnalysisPhase, AnalysisResult, FilePayload, OrchestratorEvent, SessionState, Submission,
    SubmissionStatus, UnifiedInput, UserProfile, UserRole,
};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::identity::{extract_identity, parse_bare_role, DetectedIdentity};
use crate::intent;
use crate::persistence::SessionStore;
use crate::pipeline::{AnalysisBackend, AnalysisPipeline};
use crate::prompts;
use crate::transport::{ChatSession, ChatTransport, EventSink};
use crate::variants::{VariantCategory, VariantContext, VariantPicker, VariantSelector};

/// Surfaced when a text-only learning task fails.
pub const TASK_FAILURE_MESSAGE: &str = "I encountered an issue processing that task.";

/// Fallback error message for pipeline failures without a surfaced text.
pub const ANALYSIS_FAILURE_MESSAGE: &str = "Analysis pipeline failed.";

/// Caller-owned session orchestrator.
///
/// Constructed once per conversation; [`Orchestrator::reset`] returns it to
/// a fresh session without rebuilding the collaborators.
pub struct Orchestrator {
    state: SessionState,
    variants: VariantSelector,
    pipeline: AnalysisPipeline,
    store: Arc<dyn SessionStore>,
    primary: Arc<dyn ChatTransport>,
    fallback: Option<Arc<dyn ChatTransport>>,
    chat_model: String,
    guest: bool,
    chat: Option<Arc<Mutex<ChatSession>>>,
}

impl Orchestrator {
    pub fn new(
        config: &EngineConfig,
        backend: Arc<dyn AnalysisBackend>,
        primary: Arc<dyn ChatTransport>,
        fallback: Option<Arc<dyn ChatTransport>>,
        store: Arc<dyn SessionStore>,
        guest: bool,
    ) -> Self {
        Self {
            state: SessionState::default(),
            variants: VariantSelector::new(),
            pipeline: AnalysisPipeline::new(backend, Arc::clone(&store), guest),
            store,
            primary,
            fallback,
            chat_model: config.chat_model.clone(),
            guest,
            chat: None,
        }
    }

    /// Substitute the variant-picking strategy (tests use a fixed picker).
    pub fn with_variant_picker(mut self, picker: Box<dyn VariantPicker>) -> Self {
        self.variants = VariantSelector::with_picker(picker);
        self
    }

    /// Current session state, read-only.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Clear session state and discard the ongoing chat session. An
    /// in-flight request against the old session is not aborted; its
    /// resolution has no observer.
    pub fn reset(&mut self) {
        self.state = SessionState::default();
        self.chat = None;
        info!("session reset");
    }

    /// Independent throwaway session for isolated one-shot generation,
    /// sharing the configured transports but not the ongoing history.
    pub fn one_shot_session(&self, instruction: impl Into<String>) -> ChatSession {
        ChatSession::new(
            Arc::clone(&self.primary),
            self.fallback.clone(),
            self.chat_model.clone(),
            instruction,
        )
    }

    /// Process one user turn, pushing its events into `events`.
    ///
    /// Empty input produces no events. Failures never escape as errors;
    /// they terminate the turn's event sequence per the event contract.
    pub async fn process_input(&mut self, input: UnifiedInput, events: &EventSink) {
        if !self.state.initialized {
            if !self.guest {
                match self.store.load_profile() {
                    Ok(Some(profile)) => {
                        self.state.user_role = profile.role;
                        self.state.user_name = profile.name;
                        self.state.role_confirmed = profile.role.is_some();
                    }
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "profile load failed, starting fresh"),
                }
            }
            self.state.initialized = true;
        }

        // An explicit upload is always a task; identity/intent classification
        // is skipped entirely.
        if let Some(file) = &input.file {
            self.state.has_introduced_self = true;
            self.run_analysis_turn(file, input.text.as_deref(), events)
                .await;
            return;
        }

        let text = match input.text.as_deref() {
            Some(t) if !t.trim().is_empty() => t,
            _ => {
                debug!("empty input, nothing to do");
                return;
            }
        };

        let signals = intent::classify(text);
        let detected = extract_identity(text);

        if let Some(name) = &detected.name {
            self.state.user_name = Some(name.clone());
        }
        if let Some(role) = detected.role {
            // An explicit statement also answers any pending role question.
            self.state.confirm_role(role);
            self.state.role_asked = false;
        }
        if !detected.is_empty() {
            self.persist_profile();
        }

        let role_pending = self.state.role_asked && !self.state.role_confirmed;
        if !signals.is_task && (signals.is_conversational || !detected.is_empty() || role_pending) {
            self.handle_conversational_turn(text, &detected, events);
            return;
        }

        self.state.has_introduced_self = true;
        self.run_task_turn(text, events).await;
    }

    /// Conversational turn: orientation, role inquiry, or continuity.
    fn handle_conversational_turn(
        &mut self,
        text: &str,
        detected: &DetectedIdentity,
        events: &EventSink,
    ) {
        let mut bare_role_confirmed = false;
        if self.state.role_asked && !self.state.role_confirmed {
            match parse_bare_role(text) {
                Some(role) => {
                    self.state.confirm_role(role);
                    self.state.role_asked = false;
                    bare_role_confirmed = true;
                    self.persist_profile();
                }
                None => {
                    // Question abandoned; treat the turn as continuation
                    // and never re-ask.
                    self.state.role_asked = false;
                }
            }
        }

        let context = VariantContext {
            role: self.state.user_role,
            name: self.state.user_name.as_deref(),
        };

        let first_contact =
            !self.state.has_introduced_self || !detected.is_empty() || bare_role_confirmed;
        if first_contact {
            self.state.has_introduced_self = true;
            let reply = if self.state.user_role.is_some() {
                self.variants.select(VariantCategory::Greeting, &context)
            } else if !self.state.role_asked {
                self.state.role_asked = true;
                self.variants.select(VariantCategory::Greeting, &context)
            } else {
                // Role question already posed and ignored once.
                self.variants.select(VariantCategory::Continuity, &context)
            };
            let _ = events.send(OrchestratorEvent::chunk(reply));
        } else {
            let reply = self.variants.select(VariantCategory::Continuity, &context);
            let _ = events.send(OrchestratorEvent::chunk(reply));
        }
        let _ = events.send(OrchestratorEvent::TaskComplete);
    }

    /// File-present turn: run the analysis pipeline and emit its lifecycle.
    async fn run_analysis_turn(
        &mut self,
        file: &FilePayload,
        note: Option<&str>,
        events: &EventSink,
    ) {
        let mut submission = Submission::new(&file.name);
        submission.status = SubmissionStatus::Processing;
        let _ = events.send(OrchestratorEvent::PhaseUpdate {
            phase: AnalysisPhase::Processing,
        });

        match self.pipeline.run(file, note, self.state.user_role).await {
            Ok(mut result) => {
                result.id = submission.id.clone();
                let mut completed = submission.clone();
                completed.status = SubmissionStatus::Completed;
                completed.result = Some(result);

                // The save is part of the completing turn; the submission
                // moves PROCESSING -> COMPLETED only once the record is
                // durable, keeping the lifecycle monotonic on a failed save.
                if !self.guest {
                    if let Err(err) = self.store.save_submission(&completed) {
                        warn!(submission = %submission.id, error = %err, "failed to persist submission");
                        self.emit_analysis_error(
                            &mut submission,
                            ANALYSIS_FAILURE_MESSAGE.to_string(),
                            events,
                        );
                        return;
                    }
                }
                submission = completed;

                if let Some(result) = &submission.result {
                    self.spawn_context_injection(result);
                }

                let follow_up = self.analysis_follow_up(&submission);
                let _ = events.send(OrchestratorEvent::SubmissionComplete {
                    submission: Box::new(submission),
                });
                let _ = events.send(OrchestratorEvent::PhaseUpdate {
                    phase: AnalysisPhase::Complete,
                });
                let _ = events.send(OrchestratorEvent::follow_up(follow_up));
            }
            Err(err) => {
                let message = surface_message(&err);
                self.emit_analysis_error(&mut submission, message, events);
            }
        }
    }

    fn emit_analysis_error(
        &self,
        submission: &mut Submission,
        message: String,
        events: &EventSink,
    ) {
        submission.status = SubmissionStatus::Error;
        submission.error = Some(message.clone());
        let _ = events.send(OrchestratorEvent::error(message));
        let _ = events.send(OrchestratorEvent::PhaseUpdate {
            phase: AnalysisPhase::Error,
        });
    }

    /// Role-aware follow-up after a completed analysis. A teacher with a
    /// teacher-only insight sees the insight verbatim ahead of the variant.
    fn analysis_follow_up(&self, submission: &Submission) -> String {
        let context = VariantContext {
            role: self.state.user_role,
            name: self.state.user_name.as_deref(),
        };
        let variant = self
            .variants
            .select(VariantCategory::FollowUpAnalysis, &context);

        if self.state.user_role == Some(UserRole::Teacher) {
            if let Some(insight) = submission
                .result
                .as_ref()
                .and_then(AnalysisResult::teacher_insight_text)
            {
                return format!("{insight}\n\n{variant}");
            }
        }
        variant
    }

    /// Text-only task turn: stream the learning task through the ongoing
    /// chat session.
    async fn run_task_turn(&mut self, text: &str, events: &EventSink) {
        let role_label = self.state.user_role.map_or("Ambiguous", |r| r.label());
        let message = format!("[Active user role: {role_label}] {text}");
        let session = self.ongoing_session();

        let outcome = {
            let mut session = session.lock().await;
            session.send_streaming(&message, events).await
        };

        match outcome {
            Ok(_) => {
                let _ = events.send(OrchestratorEvent::TaskComplete);
                let context = VariantContext {
                    role: self.state.user_role,
                    name: self.state.user_name.as_deref(),
                };
                let follow_up = self.variants.select(VariantCategory::FollowUpTask, &context);
                let _ = events.send(OrchestratorEvent::follow_up(follow_up));
            }
            Err(err) => {
                warn!(error = %err, "learning task failed");
                let _ = events.send(OrchestratorEvent::error(TASK_FAILURE_MESSAGE));
                let _ = events.send(OrchestratorEvent::PhaseUpdate {
                    phase: AnalysisPhase::Error,
                });
            }
        }
    }

    /// Fire-and-forget: push a summary of the new result into the ongoing
    /// chat session so later task turns can target the identified gaps.
    fn spawn_context_injection(&mut self, result: &AnalysisResult) {
        let summary = build_context_summary(result);
        let session = self.ongoing_session();
        tokio::spawn(async move {
            let mut session = session.lock().await;
            if let Err(err) = session.send(&summary).await {
                warn!(error = %err, "context injection failed");
            }
        });
    }

    fn ongoing_session(&mut self) -> Arc<Mutex<ChatSession>> {
        if let Some(chat) = &self.chat {
            return Arc::clone(chat);
        }
        let chat = Arc::new(Mutex::new(ChatSession::new(
            Arc::clone(&self.primary),
            self.fallback.clone(),
            self.chat_model.clone(),
            prompts::CHAT_WORKSPACE_INSTRUCTION,
        )));
        self.chat = Some(Arc::clone(&chat));
        chat
    }

    /// Best-effort: keep the persisted profile in step with the session.
    fn persist_profile(&self) {
        if self.guest {
            return;
        }
        let profile = UserProfile {
            name: self.state.user_name.clone(),
            role: self.state.user_role,
        };
        if let Err(err) = self.store.save_profile(&profile) {
            warn!(error = %err, "profile save failed");
        }
    }
}

/// The message carried by an error event for a failed analysis turn.
fn surface_message(err: &EngineError) -> String {
    match err {
        EngineError::Stage { message, .. } => message.clone(),
        _ => ANALYSIS_FAILURE_MESSAGE.to_string(),
    }
}

/// Summary of a completed analysis, injected into chat history.
fn build_context_summary(result: &AnalysisResult) -> String {
    let observations = result
        .feedback
        .iter()
        .map(|f| format!("- {}: {}", f.kind.as_str().to_uppercase(), f.text))
        .collect::<Vec<_>>()
        .join("\n");
    let gaps = result
        .gaps()
        .map(|f| f.text.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let insights = result
        .insights
        .iter()
        .map(|i| format!("- {}: {}", i.title, i.trend.as_str()))
        .collect::<Vec<_>>()
        .join("\n");
    let (status, evidence) = match &result.concept_stability {
        Some(cs) => (cs.status.as_str(), cs.evidence.as_str()),
        None => ("Unknown", "No specific evidence"),
    };

    format!(
        "[SYSTEM UPDATE: LEARNING CONTEXT AVAILABLE]\n\
         New analysis completed.\n\
         Subject: {subject} ({topic}).\n\
         Ownership: {ownership}.\n\
         \n\
         Observation Summary:\n\
         {observations}\n\
         \n\
         Identified Learning Gaps:\n\
         {gaps}\n\
         \n\
         Stability Signal: {status} ({evidence})\n\
         \n\
         Previous Insights (Longitudinal):\n\
         {insights}\n\
         \n\
         Teacher Insight (If any): {teacher_insight}\n\
         \n\
         This information is available for future task generation. \
         Use it to infer intent (misconception vs slip) and sequence diagnostics.",
        subject = result.subject,
        topic = result.topic,
        ownership = result.ownership.kind.as_str(),
        teacher_insight = result.teacher_insight_text().unwrap_or("None"),
    )
}
