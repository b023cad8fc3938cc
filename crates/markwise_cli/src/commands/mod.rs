//! CLI command definitions.
//!
//! This module defines the command structure for the Markwise CLI and the
//! shared plumbing that wires commands to the engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use markwise_core::{OrchestratorEvent, UnifiedInput};
use markwise_engine::{
    config::EngineConfig,
    orchestrator::Orchestrator,
    persistence::FileStore,
    pipeline::HttpAnalysisBackend,
    transport::{ChatTransport, HttpChatTransport},
};

pub mod analyze;
pub mod chat;

/// Markwise - smart classroom feedback engine
#[derive(Parser)]
#[command(name = "markwise")]
#[command(version, about = "Markwise - smart classroom feedback engine")]
#[command(long_about = r#"
Markwise analyzes student work, diagnoses learning gaps and generates
targeted practice, adapting its feedback to teachers and students.

WORKFLOWS:
  chat      → Interactive session: converse, upload work, request tasks
  analyze   → One-shot analysis of a single submission

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Configuration error
  4 - Analysis failure

Configuration comes from .markwise/settings.json in the data directory,
with MARKWISE_API_BASE and friends as environment fallbacks.
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Data directory holding .markwise state (defaults to current directory)
    #[arg(long, global = true, default_value = ".")]
    pub data_dir: PathBuf,

    /// Guest mode: no profile is loaded and nothing is written to disk
    #[arg(long, global = true)]
    pub guest: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive feedback session
    Chat(chat::ChatArgs),

    /// Analyze a single submission and print the report
    Analyze(analyze::AnalyzeArgs),
}

/// Options shared by every subcommand.
pub struct CliContext {
    pub data_dir: PathBuf,
    pub guest: bool,
    pub quiet: bool,
}

/// Wire an orchestrator to the configured gateway and file store.
pub(crate) fn build_orchestrator(
    context: &CliContext,
    model_override: Option<&str>,
) -> Result<Orchestrator> {
    let mut config = EngineConfig::load(&context.data_dir)
        .context("Failed to load engine configuration")?;
    if let Some(model) = model_override {
        config = config.with_chat_model(model);
    }

    let mut backend = HttpAnalysisBackend::new(&config.api_base);
    let mut primary = HttpChatTransport::new(&config.api_base);
    if let Some(key) = &config.api_key {
        backend = backend.with_api_key(key.clone());
        primary = primary.with_api_key(key.clone());
    }

    let fallback = config.fallback_api_base.as_ref().map(|base| {
        let mut transport = HttpChatTransport::new(base.clone());
        if let Some(key) = &config.api_key {
            transport = transport.with_api_key(key.clone());
        }
        Arc::new(transport) as Arc<dyn ChatTransport>
    });

    let store = Arc::new(FileStore::new(&config.data_dir));

    Ok(Orchestrator::new(
        &config,
        Arc::new(backend),
        Arc::new(primary),
        fallback,
        store,
        context.guest,
    ))
}

/// Run one turn, rendering events as they arrive. Returns the first error
/// message the turn emitted, if any.
pub(crate) async fn drive_turn(
    engine: &mut Orchestrator,
    input: UnifiedInput,
    quiet: bool,
) -> Option<String> {
    let (sink, mut events) = tokio::sync::mpsc::unbounded_channel();
    let renderer = tokio::spawn(async move {
        let mut first_error = None;
        while let Some(event) = events.recv().await {
            if let OrchestratorEvent::Error { message } = &event {
                if first_error.is_none() {
                    first_error = Some(message.clone());
                }
            }
            crate::render::render_event(&event, quiet);
        }
        first_error
    });

    engine.process_input(input, &sink).await;
    drop(sink);
    renderer.await.unwrap_or_default()
}

/// Declared mime type for an upload, by file extension.
pub(crate) fn mime_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
