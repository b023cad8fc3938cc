//! Gateway instruction prompts and reasoning-prompt assembly.
//!
//! The instruction texts are opaque configuration as far as orchestration is
//! concerned; what matters to the engine is that interpretation and
//! reasoning demand strict JSON matching the wire schemas. The reasoning
//! prompt itself is assembled client-side so orchestration keeps control of
//! the instruction hierarchy.

use markwise_core::{InterpretationContext, UserRole};

/// Perception stage instruction: extract, never judge.
pub const PERCEPTION_INSTRUCTION: &str = r#"You are the Perception Layer of Markwise.
Your ONLY job is to extract text and describe visual structure from the provided work.
Do not grade. Do not judge. Do not explain.
Output the raw text plus a brief structural description (e.g. "Handwritten equations on graph paper")."#;

/// Interpretation stage instruction: classify and detect ownership.
pub const INTERPRETATION_INSTRUCTION: &str = r#"You are the Interpretation Layer of Markwise.
Classify the provided content.

TASK:
1. Identify subject, topic, difficulty and the user's intent (solution, explanation or both).
2. Detect ownership: look for "Name:", "Class:", roll numbers, school headers or stamps.
   A third-party name means teacher_uploaded_student_work; otherwise student_direct.
   Extract the student's name and class when visible.

Return a single JSON object with keys subject, topic, difficulty, intent, ownership. No markdown fences."#;

/// Reasoning stage instruction: full diagnostic output.
pub const REASONING_INSTRUCTION: &str = r#"You are Markwise, a supportive classroom feedback engine, not a judge.
Turn the submitted work into learning intelligence.

VOICE:
- ownership student_direct: speak to the user in the second person.
- ownership teacher_uploaded_student_work: speak to the teacher in the third person and
  refer to the student by name or as "the student". Never address the student as "you".

TONE: calm, precise, supportive. Say "gap in understanding", not "failure".
Write math as plain text (x, y = mx + c); never use $-delimited notation.

When HISTORY is present, compare against it and mark each insight's trend
(stable, improving, declining, new) and the concept_stability signal.

Return a single JSON object with keys score {value, label, reasoning},
feedback [{type, text, reference}], handwriting {quality, feedback},
insights [{title, description, trend}], guidance [{step, rationale}],
concept_stability {status, evidence} and teacher_insight. No markdown fences."#;

/// System instruction for the conversational workspace session.
pub const CHAT_WORKSPACE_INSTRUCTION: &str = r#"You are Markwise, a classroom feedback engine helping teachers and students.
Generate questions, worked practice and explanations on request.
Keep answers concise and classroom-ready. Write math as plain text, never $-delimited.
When a [SYSTEM UPDATE] message supplies learning context, use it to target known gaps
without quoting it back to the user."#;

/// Assemble the reasoning prompt from the interpretation context, history
/// text and the user's explicit instruction.
pub fn build_reasoning_prompt(
    extracted_text: &str,
    context: &InterpretationContext,
    user_instruction: Option<&str>,
    history: &str,
    role: Option<UserRole>,
) -> String {
    let role_label = role.map_or("Unknown", |r| r.label());
    let student = context
        .ownership
        .student
        .as_ref()
        .map_or("Unknown", |s| s.name.as_str());
    let class = context
        .ownership
        .student
        .as_ref()
        .and_then(|s| s.class.as_deref())
        .unwrap_or("Unknown");

    format!(
        "[LEVEL 2: USER ROLE & OWNERSHIP]\n\
         Active Role: {role_label}\n\
         Ownership Type: {ownership}\n\
         Student: {student} ({class})\n\
         \n\
         [LEVEL 3: USER REQUEST & INTENT]\n\
         Detected Intent: {intent}\n\
         Explicit Instruction: {instruction}\n\
         \n\
         [LEVEL 4: CONTEXT]\n\
         Subject/Topic: {subject} / {topic}\n\
         History: {history}\n\
         \n\
         [CONTENT TO ANALYZE]\n\
         {extracted_text}\n\
         \n\
         Analyze strictly following the INSTRUCTION HIERARCHY.\n\
         Return a single JSON object.",
        ownership = context.ownership.kind.as_str(),
        intent = context.intent.as_str(),
        instruction = user_instruction.unwrap_or("None"),
        subject = context.subject,
        topic = context.topic,
        history = if history.is_empty() { "None" } else { history },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use markwise_core::{AttributionConfidence, OwnershipContext, OwnershipKind, StudentRef};

    #[test]
    fn test_prompt_contains_all_blocks() {
        let context = InterpretationContext::default();
        let prompt = build_reasoning_prompt("2 + 2 = 5", &context, None, "", None);

        assert!(prompt.contains("[LEVEL 2: USER ROLE & OWNERSHIP]"));
        assert!(prompt.contains("[LEVEL 3: USER REQUEST & INTENT]"));
        assert!(prompt.contains("[LEVEL 4: CONTEXT]"));
        assert!(prompt.contains("[CONTENT TO ANALYZE]\n2 + 2 = 5"));
        assert!(prompt.contains("Active Role: Unknown"));
        assert!(prompt.contains("Explicit Instruction: None"));
        assert!(prompt.contains("History: None"));
        assert!(prompt.contains("Subject/Topic: General / Unknown"));
    }

    #[test]
    fn test_prompt_renders_teacher_upload() {
        let mut context = InterpretationContext::default();
        context.subject = "Math".into();
        context.topic = "Fractions".into();
        context.ownership = OwnershipContext {
            kind: OwnershipKind::TeacherUploadedStudentWork,
            student: Some(StudentRef {
                name: "Ada".into(),
                class: Some("9B".into()),
                confidence: AttributionConfidence::High,
            }),
        };

        let prompt = build_reasoning_prompt(
            "work",
            &context,
            Some("focus on method"),
            "- Fractions: declining",
            Some(UserRole::Teacher),
        );

        assert!(prompt.contains("Active Role: Teacher"));
        assert!(prompt.contains("Ownership Type: teacher_uploaded_student_work"));
        assert!(prompt.contains("Student: Ada (9B)"));
        assert!(prompt.contains("Explicit Instruction: focus on method"));
        assert!(prompt.contains("History: - Fractions: declining"));
    }
}
