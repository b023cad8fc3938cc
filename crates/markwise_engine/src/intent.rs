//! Intent classification for free-text turns.
//!
//! Two pure predicates over one utterance: does it ask for work
//! ([`is_task_intent`]) and does it read as small talk
//! ([`is_conversational_intent`])? The predicates are not mutually exclusive;
//! when both fire the orchestrator routes to task handling (business rule).
//!
//! The rule tables are deliberately enumerable consts so the vocabulary can
//! be audited and swapped without touching orchestration.

/// Keywords that signal a work request anywhere in the text.
const TASK_KEYWORDS: &[&str] = &[
    "generate", "create", "make", "analyze", "check", "quiz", "test",
    "practice", "questions", "exam", "exercises", "grade", "assess", "solve",
];

/// Leading verbs that signal a work request ("how do I...", "calculate...").
const TASK_STARTERS: &[&str] = &["what", "how", "calculate", "find", "explain", "why"];

/// Operator characters counting toward the implicit-math signal.
const MATH_OPERATORS: &[char] = &['+', '-', '*', '/', '=', '^'];

/// Shortest text that can fire the implicit-math signal.
const IMPLICIT_MATH_MIN_LEN: usize = 4;

const GREETINGS: &[&str] = &[
    "hi", "hello", "hey", "greetings", "yo", "hiya", "sup", "howdy", "good morning",
];

const IDENTITY_PREFIXES: &[&str] = &["i am ", "im ", "my name is ", "call me "];

const PHATIC_TOKENS: &[&str] = &["ok", "okay", "thanks", "thank you", "cool", "nice"];

const META_QUESTIONS: &[&str] = &[
    "who are you",
    "what is markwise",
    "what is this",
    "what can you do",
];

/// Both intent signals for one utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentSignals {
    pub is_task: bool,
    pub is_conversational: bool,
}

/// Classify one utterance.
pub fn classify(text: &str) -> IntentSignals {
    IntentSignals {
        is_task: is_task_intent(text),
        is_conversational: is_conversational_intent(text),
    }
}

/// Does this text ask the engine to do work?
///
/// Fires on task keywords, on an implicit math expression (digits/operators
/// in anything longer than a couple of characters), or on an interrogative
/// task verb at the start of the text. The canned meta-questions never fire
/// the interrogative rule, keeping the task and conversational vocabularies
/// disjoint.
pub fn is_task_intent(text: &str) -> bool {
    let t = text.trim().to_lowercase();

    if TASK_KEYWORDS.iter().any(|k| t.contains(k)) {
        return true;
    }

    if has_implicit_math(&t) {
        return true;
    }

    if !META_QUESTIONS.iter().any(|q| t.contains(q)) {
        let clean = strip_punctuation(&t);
        if let Some(first) = clean.split_whitespace().next() {
            if TASK_STARTERS.contains(&first) {
                return true;
            }
        }
    }

    false
}

/// Does this text read as small talk (greeting, introduction, acknowledgement
/// or a canned question about the engine itself)?
pub fn is_conversational_intent(text: &str) -> bool {
    let t = text.trim().to_lowercase();
    let clean = strip_punctuation(&t);

    if GREETINGS
        .iter()
        .any(|g| clean == *g || clean.starts_with(&format!("{g} ")))
    {
        return true;
    }
    if IDENTITY_PREFIXES
        .iter()
        .any(|p| clean.starts_with(p) || clean.contains(&format!(" {p}")))
    {
        return true;
    }
    if PHATIC_TOKENS.contains(&clean.as_str()) {
        return true;
    }
    if META_QUESTIONS.iter().any(|q| t.contains(q)) {
        return true;
    }

    false
}

fn has_implicit_math(t: &str) -> bool {
    t.chars().count() >= IMPLICIT_MATH_MIN_LEN
        && t.chars()
            .any(|c| c.is_ascii_digit() || MATH_OPERATORS.contains(&c))
}

fn strip_punctuation(t: &str) -> String {
    t.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect::<String>()
        .trim()
        .to_string()
}
