//! Structured output of the analysis pipeline.
//!
//! These shapes mirror the gateway's reasoning/interpretation schemas on the
//! wire (snake_case values) while the assembled [`AnalysisResult`] itself is
//! persisted with camelCase field names like the rest of the disk formats.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::UserRole;

/// Latency/cost routing decision for the reasoning stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    Fast,
    Deep,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Fast => "fast",
            AnalysisMode::Deep => "deep",
        }
    }
}

impl std::fmt::Display for AnalysisMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the user wants from the analysis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisIntent {
    Solution,
    Explanation,
    Both,
}

impl AnalysisIntent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisIntent::Solution => "solution",
            AnalysisIntent::Explanation => "explanation",
            AnalysisIntent::Both => "both",
        }
    }
}

/// Whose work the submission is, which governs narrative voice downstream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipKind {
    StudentDirect,
    TeacherUploadedStudentWork,
}

impl OwnershipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnershipKind::StudentDirect => "student_direct",
            OwnershipKind::TeacherUploadedStudentWork => "teacher_uploaded_student_work",
        }
    }
}

/// How confident the interpretation stage is about a student attribution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttributionConfidence {
    High,
    Medium,
    Low,
}

/// Student named on a teacher-uploaded artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StudentRef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub confidence: AttributionConfidence,
}

/// Ownership context resolved once per submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OwnershipContext {
    #[serde(rename = "type")]
    pub kind: OwnershipKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub student: Option<StudentRef>,
}

impl OwnershipContext {
    pub fn student_direct() -> Self {
        Self {
            kind: OwnershipKind::StudentDirect,
            student: None,
        }
    }
}

/// Output of the interpretation stage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InterpretationContext {
    pub subject: String,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    pub intent: AnalysisIntent,
    pub ownership: OwnershipContext,
}

impl Default for InterpretationContext {
    /// Safe degraded context used when interpretation fails.
    fn default() -> Self {
        Self {
            subject: "General".to_string(),
            topic: "Unknown".to_string(),
            difficulty: None,
            intent: AnalysisIntent::Explanation,
            ownership: OwnershipContext::student_direct(),
        }
    }
}

/// Grade assigned by the reasoning stage. Value is free-form ("8/10", "B+",
/// or "-" when the gateway could not grade).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Score {
    pub value: String,
    pub label: String,
    pub reasoning: String,
}

impl Score {
    /// Placeholder used when the reasoning response carries no usable score.
    pub fn pending() -> Self {
        Self {
            value: "-".to_string(),
            label: "Pending".to_string(),
            reasoning: "Analysis incomplete".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackKind {
    Strength,
    Gap,
    Neutral,
}

impl FeedbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackKind::Strength => "strength",
            FeedbackKind::Gap => "gap",
            FeedbackKind::Neutral => "neutral",
        }
    }
}

/// One feedback item, optionally referencing a location in the work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedbackItem {
    #[serde(rename = "type")]
    pub kind: FeedbackKind,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InsightTrend {
    Stable,
    Improving,
    Declining,
    New,
}

impl InsightTrend {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightTrend::Stable => "stable",
            InsightTrend::Improving => "improving",
            InsightTrend::Declining => "declining",
            InsightTrend::New => "new",
        }
    }
}

/// A longitudinal observation about the learner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Insight {
    pub title: String,
    pub description: String,
    pub trend: InsightTrend,
}

/// A concrete next step with its rationale.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuidanceStep {
    pub step: String,
    pub rationale: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HandwritingQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    Illegible,
}

/// Legibility assessment for handwritten work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Handwriting {
    pub quality: HandwritingQuality,
    pub feedback: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StabilityStatus {
    Emerging,
    UnstablePressure,
    Stabilizing,
    Robust,
    Unknown,
}

impl StabilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StabilityStatus::Emerging => "emerging",
            StabilityStatus::UnstablePressure => "unstable_pressure",
            StabilityStatus::Stabilizing => "stabilizing",
            StabilityStatus::Robust => "robust",
            StabilityStatus::Unknown => "unknown",
        }
    }
}

/// How robust the learner's grasp of the concept appears across variations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConceptStability {
    pub status: StabilityStatus,
    pub evidence: String,
}

/// Complete structured outcome of one analyzed submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Back-filled with the owning submission's id on assembly.
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub subject: String,
    pub topic: String,
    pub score: Score,
    #[serde(default)]
    pub feedback: Vec<FeedbackItem>,
    #[serde(default)]
    pub insights: Vec<Insight>,
    #[serde(default)]
    pub guidance: Vec<GuidanceStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handwriting: Option<Handwriting>,
    #[serde(rename = "conceptStability", skip_serializing_if = "Option::is_none")]
    pub concept_stability: Option<ConceptStability>,
    /// Teacher-only diagnostic remark, never shown to students.
    #[serde(rename = "teacherInsight", skip_serializing_if = "Option::is_none")]
    pub teacher_insight: Option<String>,
    pub ownership: OwnershipContext,
    /// Raw text recovered by the perception stage.
    #[serde(rename = "rawText")]
    pub raw_text: String,
}

impl AnalysisResult {
    /// Teacher insight, if present and non-blank.
    pub fn teacher_insight_text(&self) -> Option<&str> {
        self.teacher_insight
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Feedback items marked as gaps.
    pub fn gaps(&self) -> impl Iterator<Item = &FeedbackItem> {
        self.feedback
            .iter()
            .filter(|f| f.kind == FeedbackKind::Gap)
    }
}

/// Reasoning-stage request context carried alongside the prompt.
#[derive(Debug, Clone)]
pub struct ReasoningContext {
    pub interpretation: InterpretationContext,
    pub history: String,
    pub user_instruction: Option<String>,
    pub role: Option<UserRole>,
    pub mode: AnalysisMode,
}
