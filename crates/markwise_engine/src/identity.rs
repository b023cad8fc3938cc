//! Identity extraction from free text.
//!
//! Pure, deterministic classifier: given one utterance, detect a
//! self-introduced name and/or a stated role. Name and role detection are
//! independent; both may fire on the same input ("I'm Dana, a teacher").

use std::sync::LazyLock;

use regex::Regex;

use markwise_core::UserRole;

/// Name/role signals detected in one utterance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectedIdentity {
    pub name: Option<String>,
    pub role: Option<UserRole>,
}

impl DetectedIdentity {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.role.is_none()
    }
}

/// Captures that are introduction-shaped but not names ("I'm ready").
const NAME_DISALLOW: &[&str] = &[
    "a teacher",
    "a student",
    "ready",
    "here",
    "listening",
    "markwise",
];

// The capture is lazy and the terminator (end of text, '.', '!' or ',') is
// matched as an explicit group, since the regex crate has no lookahead.
static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|\s)(?:i['’]m|i\s+am|my\s+name\s+is|call\s+me)\s+([a-zA-Z][a-zA-Z\s]*?)\s*(?:$|[.!,])")
        .expect("valid name pattern")
});

static TEACHER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|\s)(?:teacher|educator|professor|instructor)")
        .expect("valid teacher pattern")
});

static STUDENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|\s)(?:student|learner|pupil)").expect("valid student pattern")
});

/// Extract a self-introduced name and/or stated role from free text.
pub fn extract_identity(text: &str) -> DetectedIdentity {
    let t = text.trim();
    let mut result = DetectedIdentity::default();

    if let Some(caps) = NAME_PATTERN.captures(t) {
        if let Some(raw) = caps.get(1) {
            let name = raw.as_str().trim();
            if !NAME_DISALLOW.contains(&name.to_lowercase().as_str()) {
                result.name = Some(title_case(name));
            }
        }
    }

    // Teacher wins when both vocabularies appear in one utterance.
    if TEACHER_PATTERN.is_match(t) {
        result.role = Some(UserRole::Teacher);
    } else if STUDENT_PATTERN.is_match(t) {
        result.role = Some(UserRole::Student);
    }

    result
}

/// Parse a bare answer to a pending role question ("teacher", "I teach...").
pub fn parse_bare_role(text: &str) -> Option<UserRole> {
    let t = text.to_lowercase();
    if t.contains("teacher") || t.contains("educator") {
        return Some(UserRole::Teacher);
    }
    if t.contains("student") || t.contains("learner") {
        return Some(UserRole::Student);
    }
    None
}

/// First whitespace-delimited token of a stored name, for interpolation.
pub fn first_name(name: &str) -> &str {
    name.split_whitespace().next().unwrap_or(name)
}

fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
