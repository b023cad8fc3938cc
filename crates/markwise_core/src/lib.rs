//! # markwise_core - Domain Model for the Markwise Feedback Engine
//!
//! Shared data types used across the Markwise workspace:
//! - Session state, roles and user profiles
//! - Unified turn input (free text and/or an uploaded artifact)
//! - Submissions and their lifecycle
//! - Structured analysis results (score, feedback, insights, guidance)
//! - The orchestrator's caller-facing event stream
//!
//! This crate is pure data plus serde; all behavior lives in
//! `markwise_engine`.

pub mod analysis;
pub mod events;
pub mod types;

pub use analysis::*;
pub use events::*;
pub use types::*;
