//! Session, input and submission types shared across the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Confirmed user role within a session.
///
/// "Not yet known" is expressed as `Option<UserRole>` rather than a third
/// variant, so the type system tracks where a role is actually required.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Teacher,
    Student,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Teacher => "teacher",
            UserRole::Student => "student",
        }
    }

    /// Capitalized form used in message prefixes and summaries.
    pub fn label(&self) -> &'static str {
        match self {
            UserRole::Teacher => "Teacher",
            UserRole::Student => "Student",
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Mutable per-conversation state owned by the orchestrator.
///
/// Invariants: `role_confirmed` implies `user_role.is_some()`; `role_asked`
/// is true only while exactly one role question is pending and is cleared on
/// the next text turn whether or not the answer parses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    /// One-way latch: the engine has introduced itself this session.
    #[serde(rename = "hasIntroducedSelf")]
    pub has_introduced_self: bool,
    /// The user's role has been confirmed (stated or loaded from profile).
    #[serde(rename = "roleConfirmed")]
    pub role_confirmed: bool,
    #[serde(rename = "userRole", skip_serializing_if = "Option::is_none")]
    pub user_role: Option<UserRole>,
    #[serde(rename = "userName", skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    /// A role question was posed and no answer has arrived yet.
    #[serde(rename = "roleAsked")]
    pub role_asked: bool,
    /// First-call profile seeding has run.
    pub initialized: bool,
}

impl SessionState {
    /// Record a confirmed role, upholding the confirmation invariant.
    pub fn confirm_role(&mut self, role: UserRole) {
        self.user_role = Some(role);
        self.role_confirmed = true;
    }
}

/// Persisted user profile, seeded into new non-guest sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,
}

/// An uploaded artifact: raw bytes plus declared mime type.
#[derive(Debug, Clone)]
pub struct FilePayload {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl FilePayload {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

/// One user turn: free text, an uploaded file, or both.
///
/// File presence is dominant; accompanying text rides along as the user's
/// instruction for the analysis.
#[derive(Debug, Clone, Default)]
pub struct UnifiedInput {
    pub text: Option<String>,
    pub file: Option<FilePayload>,
}

impl UnifiedInput {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            file: None,
        }
    }

    pub fn from_file(file: FilePayload) -> Self {
        Self {
            text: None,
            file: Some(file),
        }
    }

    /// Attach an instruction to a file turn.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.file.is_none() && self.text.as_deref().map_or(true, |t| t.trim().is_empty())
    }
}

/// Speaker of a chat turn, in the gateway's vocabulary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// A single turn of canonical conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

/// Lifecycle of one uploaded submission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionStatus {
    Created,
    Processing,
    Completed,
    Error,
}

/// Pipeline phase reported to the caller through phase-update events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnalysisPhase {
    Processing,
    Complete,
    Error,
}

/// One uploaded artifact and the outcome of its analysis.
///
/// Status moves CREATED -> PROCESSING -> {COMPLETED | ERROR}, never
/// backwards and never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub status: SubmissionStatus,
    #[serde(rename = "fileName")]
    pub file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<crate::analysis::AnalysisResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Submission {
    /// Create a fresh submission for an uploaded file.
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            status: SubmissionStatus::Created,
            file_name: file_name.into(),
            result: None,
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirm_role_sets_both_fields() {
        let mut state = SessionState::default();
        assert!(!state.role_confirmed);

        state.confirm_role(UserRole::Teacher);
        assert!(state.role_confirmed);
        assert_eq!(state.user_role, Some(UserRole::Teacher));
    }

    #[test]
    fn test_unified_input_emptiness() {
        assert!(UnifiedInput::default().is_empty());
        assert!(UnifiedInput::from_text("   ").is_empty());
        assert!(!UnifiedInput::from_text("hello").is_empty());

        let file = FilePayload::new("hw.png", "image/png", vec![1, 2, 3]);
        assert!(!UnifiedInput::from_file(file).is_empty());
    }

    #[test]
    fn test_submission_starts_created() {
        let sub = Submission::new("worksheet.pdf");
        assert_eq!(sub.status, SubmissionStatus::Created);
        assert!(sub.result.is_none());
        assert!(sub.error.is_none());
    }

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&SubmissionStatus::Processing).unwrap();
        assert_eq!(json, "\"PROCESSING\"");
        let json = serde_json::to_string(&AnalysisPhase::Complete).unwrap();
        assert_eq!(json, "\"COMPLETE\"");
    }

    #[test]
    fn test_role_wire_names() {
        let json = serde_json::to_string(&UserRole::Teacher).unwrap();
        assert_eq!(json, "\"teacher\"");
        assert_eq!(UserRole::Student.label(), "Student");
    }
}
