//! Console rendering of orchestrator events.

use std::io::Write;

use markwise_core::{AnalysisPhase, OrchestratorEvent, Submission};

/// Render one event to the console. Stream chunks are written without a
/// trailing newline; the terminating event supplies it.
pub fn render_event(event: &OrchestratorEvent, quiet: bool) {
    match event {
        OrchestratorEvent::StreamChunk { text } => {
            print!("{text}");
            let _ = std::io::stdout().flush();
        }
        OrchestratorEvent::PhaseUpdate { phase } => {
            if !quiet {
                match phase {
                    AnalysisPhase::Processing => println!("⏳ Analyzing submission..."),
                    AnalysisPhase::Complete => println!("✅ Analysis complete"),
                    AnalysisPhase::Error => {}
                }
            }
        }
        OrchestratorEvent::SubmissionComplete { submission } => {
            print_submission(submission);
        }
        OrchestratorEvent::FollowUp { text } => {
            println!();
            println!("{text}");
        }
        OrchestratorEvent::TaskComplete => {
            println!();
        }
        OrchestratorEvent::Error { message } => {
            eprintln!("❌ {message}");
        }
    }
}

fn print_submission(submission: &Submission) {
    println!();
    println!("📊 {}", submission.file_name);
    let Some(result) = &submission.result else {
        return;
    };

    println!(
        "   Score: {} ({}) - {}",
        result.score.value, result.score.label, result.score.reasoning
    );
    println!("   Subject: {} / {}", result.subject, result.topic);

    if !result.feedback.is_empty() {
        println!("   Feedback:");
        for item in &result.feedback {
            println!("     [{}] {}", item.kind.as_str(), item.text);
        }
    }
    if !result.insights.is_empty() {
        println!("   Insights:");
        for insight in &result.insights {
            println!(
                "     - {} ({}): {}",
                insight.title,
                insight.trend.as_str(),
                insight.description
            );
        }
    }
    if !result.guidance.is_empty() {
        println!("   Next steps:");
        for (index, step) in result.guidance.iter().enumerate() {
            println!("     {}) {}: {}", index + 1, step.step, step.rationale);
        }
    }
    if let Some(handwriting) = &result.handwriting {
        println!("   Handwriting: {}", handwriting.feedback);
    }
    if let Some(insight) = result.teacher_insight_text() {
        println!("   Teacher insight: {insight}");
    }
}
