//! Analyze command - One-shot submission analysis.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use markwise_core::{FilePayload, OrchestratorEvent, Submission, UnifiedInput};

use super::{build_orchestrator, drive_turn, mime_for_path, CliContext};

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Path to the submission (png, jpg, webp or pdf)
    file: PathBuf,

    /// Instruction passed along with the upload
    #[arg(short, long)]
    note: Option<String>,

    /// Output format (text, json)
    #[arg(long, default_value = "text")]
    format: String,
}

pub async fn execute(args: AnalyzeArgs, context: &CliContext) -> Result<()> {
    if !args.file.exists() {
        anyhow::bail!("File not found: {}", args.file.display());
    }

    info!("Analyzing {}", args.file.display());

    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let name = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("submission")
        .to_string();

    let mut input =
        UnifiedInput::from_file(FilePayload::new(name, mime_for_path(&args.file), bytes));
    if let Some(note) = &args.note {
        input = input.with_text(note.clone());
    }

    let mut engine = build_orchestrator(context, None)?;

    if args.format == "json" {
        let submission = run_collected(&mut engine, input).await?;
        let json = serde_json::to_string_pretty(&submission)
            .context("Failed to serialize submission")?;
        println!("{}", json);
        return Ok(());
    }

    if let Some(message) = drive_turn(&mut engine, input, context.quiet).await {
        anyhow::bail!("Analysis failed: {message}");
    }
    Ok(())
}

/// Run the turn without rendering and return the completed submission.
async fn run_collected(
    engine: &mut markwise_engine::orchestrator::Orchestrator,
    input: UnifiedInput,
) -> Result<Box<Submission>> {
    let (sink, mut events) = tokio::sync::mpsc::unbounded_channel();
    engine.process_input(input, &sink).await;
    drop(sink);

    let mut submission = None;
    while let Some(event) = events.recv().await {
        match event {
            OrchestratorEvent::SubmissionComplete { submission: s } => submission = Some(s),
            OrchestratorEvent::Error { message } => {
                anyhow::bail!("Analysis failed: {message}");
            }
            _ => {}
        }
    }
    submission.context("Turn produced no submission")
}
