//! Chat command - Interactive feedback session.
//!
//! Reads turns from stdin and renders the engine's event stream. Slash
//! commands handle uploads and session control; everything else goes to the
//! orchestrator as a text turn.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tokio::io::{AsyncBufReadExt, BufReader};

use markwise_core::{FilePayload, UnifiedInput};

use super::{build_orchestrator, drive_turn, mime_for_path, CliContext};

#[derive(Args)]
pub struct ChatArgs {
    /// Override the configured chat model id
    #[arg(long)]
    model: Option<String>,
}

pub async fn execute(args: ChatArgs, context: &CliContext) -> Result<()> {
    let mut engine = build_orchestrator(context, args.model.as_deref())?;

    if !context.quiet {
        println!("Markwise interactive session.");
        println!();
        println!("Commands:");
        println!("  /upload <path> [note]   analyze a submission");
        println!("  /reset                  start a fresh session");
        println!("  /quit                   exit");
        println!();
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "/quit" | "/exit" => break,
            "/reset" => {
                engine.reset();
                if !context.quiet {
                    println!("Session cleared.");
                }
                continue;
            }
            _ => {}
        }

        let input = if let Some(rest) = line.strip_prefix("/upload") {
            match parse_upload(rest) {
                Ok(input) => input,
                Err(e) => {
                    eprintln!("❌ {:#}", e);
                    continue;
                }
            }
        } else if line.starts_with('/') {
            println!("Unknown command. Available: /upload, /reset, /quit.");
            continue;
        } else {
            UnifiedInput::from_text(line)
        };

        drive_turn(&mut engine, input, context.quiet).await;
    }

    if !context.quiet {
        println!("Goodbye.");
    }
    Ok(())
}

/// Parse `/upload <path> [note]` into an upload turn.
fn parse_upload(rest: &str) -> Result<UnifiedInput> {
    let rest = rest.trim();
    if rest.is_empty() {
        anyhow::bail!("Usage: /upload <path> [note]");
    }

    let (path_str, note) = match rest.split_once(char::is_whitespace) {
        Some((path, note)) => (path, Some(note.trim())),
        None => (rest, None),
    };

    let path = PathBuf::from(path_str);
    let bytes =
        std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path_str)
        .to_string();

    let mut input = UnifiedInput::from_file(FilePayload::new(name, mime_for_path(&path), bytes));
    if let Some(note) = note.filter(|n| !n.is_empty()) {
        input = input.with_text(note);
    }
    Ok(input)
}
