//! # markwise_engine - Orchestration Engine for Markwise
//!
//! This crate provides the conversational feedback engine that enables:
//! - Single-entry turn processing for text, uploads, or both
//! - Role-aware conversation (teacher/student) with persistent profiles
//! - Staged submission analysis (perceive, interpret, reason)
//! - Streamed learning-task generation with transparent gateway failover
//! - Longitudinal insight history feeding later analyses
//!
//! ## Key Features
//!
//! - **One Entry Point**: `Orchestrator::process_input` consumes a turn and
//!   pushes an ordered event sequence into the caller's sink
//! - **Role Awareness**: identity extraction, a one-shot role question and
//!   role-keyed response variants
//! - **Degraded Modes**: interpretation failures fall back to a safe default
//!   context; history lookups are best-effort
//! - **Guest Mode**: nothing is read from or written to disk
//! - **Testable Seams**: transports, analysis stages, persistence and
//!   variant picking all sit behind traits with exported fakes
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐      ┌──────────────────┐
//! │   UnifiedInput   │─────▶│   Orchestrator   │──── events ───▶ caller
//! └──────────────────┘      └────────┬─────────┘
//!                                    │
//!          ┌─────────────────────────┼─────────────────────────┐
//!          ▼                         ▼                         ▼
//! ┌─────────────────┐      ┌─────────────────┐       ┌─────────────────┐
//! │  Conversational │      │ AnalysisPipeline│       │   ChatSession   │
//! │  (variants)     │      │ perceive →      │       │ (task streaming)│
//! └─────────────────┘      │ interpret →     │       └────────┬────────┘
//!          │               │ reason          │                │
//!          │               └────────┬────────┘                │
//!          │                        ▼                         ▼
//!          │               ┌─────────────────┐       ┌─────────────────┐
//!          └──────────────▶│  SessionStore   │       │  ChatTransport  │
//!                          │ profile +       │       │ primary +       │
//!                          │ submissions     │       │ fallback        │
//!                          └─────────────────┘       └─────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod identity;
pub mod intent;
pub mod mock;
pub mod orchestrator;
pub mod persistence;
pub mod pipeline;
pub mod prompts;
pub mod transport;
pub mod variants;

pub use config::*;
pub use error::*;
pub use identity::*;
pub use intent::*;
pub use mock::*;
pub use orchestrator::*;
pub use persistence::*;
pub use pipeline::*;
pub use prompts::*;
pub use transport::*;
pub use variants::*;
