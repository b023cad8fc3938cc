//! Pre-authored response variants.
//!
//! Conversational replies come from fixed pools keyed by (category, role),
//! picked uniformly at random so repeated turns don't sound canned. The pick
//! itself is the engine's only source of nondeterminism and sits behind
//! [`VariantPicker`] so tests can substitute a fixed strategy.

use rand::Rng;

use markwise_core::UserRole;

use crate::identity::first_name;

/// Which situation the reply is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantCategory {
    /// First contact or re-orientation after new identity info.
    Greeting,
    /// Steady-state acknowledgement mid-conversation.
    Continuity,
    /// Follow-up after a completed submission analysis.
    FollowUpAnalysis,
    /// Follow-up after a generated text task.
    FollowUpTask,
}

/// Role/name context the template is rendered against.
#[derive(Debug, Clone, Copy, Default)]
pub struct VariantContext<'a> {
    pub role: Option<UserRole>,
    pub name: Option<&'a str>,
}

/// Strategy for picking one template out of a pool.
pub trait VariantPicker: Send + Sync {
    /// Pick an index in `0..pool_len`; `pool_len` is always at least 1.
    fn pick(&self, pool_len: usize) -> usize;
}

/// Production picker: uniform over the pool.
pub struct ThreadRngPicker;

impl VariantPicker for ThreadRngPicker {
    fn pick(&self, pool_len: usize) -> usize {
        rand::thread_rng().gen_range(0..pool_len)
    }
}

/// Deterministic picker for tests; clamps to the pool.
pub struct FixedPicker(pub usize);

impl VariantPicker for FixedPicker {
    fn pick(&self, pool_len: usize) -> usize {
        self.0.min(pool_len - 1)
    }
}

const GREETING_TEACHER: &[&str] = &[
    "Hello{name}. As a teacher, I can help you grade efficiently, identify class-wide learning gaps, and generate targeted assessments.\n\nUpload a student submission to begin, or describe a topic you need questions for.",
    "Welcome back{name}. Upload a student submission and I'll map its strengths and gaps, or ask me for a fresh assessment set.",
    "Hello{name}. I can mark submissions, surface recurring mistakes across your class, and draft practice material.\n\nSend over a piece of student work whenever you're ready.",
];

const GREETING_STUDENT: &[&str] = &[
    "Hi{name}. I'm here to help you strengthen your understanding. I can analyze your answers to spot mistakes or generate practice questions to help you prepare.\n\nUpload your work when you're ready.",
    "Hey{name}. Show me your work and I'll point out what's solid and what needs another pass, or I can set up practice questions for you.",
    "Hi{name}. Upload an answer and I'll walk through it with you, or tell me a topic and we'll practice it together.",
];

const GREETING_UNSET: &[&str] = &[
    "Nice to meet you{name}. I'm Markwise, a smart classroom feedback engine.\n\nTo help me align my feedback, are you a Teacher or a Student?",
    "Hello{name}. I'm Markwise. I tailor feedback differently for educators and learners.\n\nAre you a Teacher or a Student?",
    "Welcome{name}. Before we start, so I can pitch my feedback right: are you a Teacher or a Student?",
];

const CONTINUITY_TEACHER: &[&str] = &[
    "I'm listening{name}. Upload a student submission or tell me what your class is working on.",
    "Ready when you are{name}. Send over student work or ask for an assessment draft.",
];

const CONTINUITY_STUDENT: &[&str] = &[
    "I'm listening{name}. Upload your answer or tell me what you'd like to practice.",
    "Go ahead{name}. Show me your work, or name a topic and we'll go through it.",
];

const CONTINUITY_UNSET: &[&str] = &[
    "I'm listening{name}. You can upload an answer or tell me what you'd like to work on.",
    "Still here{name}. Upload a piece of work or describe what you need.",
];

const FOLLOW_UP_ANALYSIS_TEACHER: &[&str] = &[
    "Analysis complete. I've highlighted the student's key gaps.\n\nWould you like to generate a practice set based on these errors?",
    "Done. The gaps I found are listed in the feedback.\n\nWant a targeted practice set for this student, or a class-wide version?",
];

const FOLLOW_UP_ANALYSIS_STUDENT: &[&str] = &[
    "I've analyzed your work. Check the feedback for tips.\n\nWant to try a few practice questions to improve this score?",
    "All done. Read through the feedback first.\n\nShall I put together some practice questions on the shaky parts?",
];

const FOLLOW_UP_ANALYSIS_UNSET: &[&str] = &[
    "Analysis complete. You can upload another answer for review,\nor I can generate practice questions focused on the areas identified.",
    "Finished. Upload another piece of work, or ask me to build practice questions from what I found.",
];

const FOLLOW_UP_TASK_TEACHER: &[&str] = &[
    "You can copy these for your class. Would you like me to create an answer key?",
    "These are ready to hand out. Want an answer key, or a harder variant?",
];

const FOLLOW_UP_TASK_STUDENT: &[&str] = &[
    "Try solving these. You can upload your answers here for me to check.",
    "Give these a go, then upload your answers and I'll check them.",
];

const FOLLOW_UP_TASK_UNSET: &[&str] = &[
    "Try these out. You can upload the worked answers here for me to check.",
    "Here you go. Upload what you come up with and I'll review it.",
];

/// Selects one rendered response variant per call.
pub struct VariantSelector {
    picker: Box<dyn VariantPicker>,
}

impl Default for VariantSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl VariantSelector {
    pub fn new() -> Self {
        Self {
            picker: Box::new(ThreadRngPicker),
        }
    }

    pub fn with_picker(picker: Box<dyn VariantPicker>) -> Self {
        Self { picker }
    }

    /// Pick a template for this (category, role) pair and interpolate the
    /// user's first name.
    pub fn select(&self, category: VariantCategory, context: &VariantContext<'_>) -> String {
        let pool = pool_for(category, context.role);
        let template = pool[self.picker.pick(pool.len())];

        let name_fragment = match context.name {
            Some(name) => format!(", {}", first_name(name)),
            None => String::new(),
        };
        template.replace("{name}", &name_fragment)
    }
}

fn pool_for(category: VariantCategory, role: Option<UserRole>) -> &'static [&'static str] {
    match (category, role) {
        (VariantCategory::Greeting, Some(UserRole::Teacher)) => GREETING_TEACHER,
        (VariantCategory::Greeting, Some(UserRole::Student)) => GREETING_STUDENT,
        (VariantCategory::Greeting, None) => GREETING_UNSET,
        (VariantCategory::Continuity, Some(UserRole::Teacher)) => CONTINUITY_TEACHER,
        (VariantCategory::Continuity, Some(UserRole::Student)) => CONTINUITY_STUDENT,
        (VariantCategory::Continuity, None) => CONTINUITY_UNSET,
        (VariantCategory::FollowUpAnalysis, Some(UserRole::Teacher)) => FOLLOW_UP_ANALYSIS_TEACHER,
        (VariantCategory::FollowUpAnalysis, Some(UserRole::Student)) => FOLLOW_UP_ANALYSIS_STUDENT,
        (VariantCategory::FollowUpAnalysis, None) => FOLLOW_UP_ANALYSIS_UNSET,
        (VariantCategory::FollowUpTask, Some(UserRole::Teacher)) => FOLLOW_UP_TASK_TEACHER,
        (VariantCategory::FollowUpTask, Some(UserRole::Student)) => FOLLOW_UP_TASK_STUDENT,
        (VariantCategory::FollowUpTask, None) => FOLLOW_UP_TASK_UNSET,
    }
}
