//! Financial Intelligence Engine
//!
//! Orchestration and governance core for classified financial queries:
//! - Builds an immutable, timelock-validated execution context per query
//! - Fans out to independently failing data workers and fans the results in
//! - Scores data quality per intent, with critical workers gating the aggregate
//! - Escalates to an injected fallback service when confidence is too low
//! - Enforces timelock, domain purity and quarantine governance before release
//! - Records every result envelope in an auditable trail
//!
//! PIPELINE:
//! PLAN → CONTEXT → EXECUTE → GOVERN → SCORE → ESCALATE? → ENVELOPE

pub mod agent;
pub mod api;
pub mod audit;
pub mod confidence;
pub mod config;
pub mod context;
pub mod error;
pub mod execution;
pub mod fallback;
pub mod gemini;
pub mod governance;
pub mod models;
pub mod news;
pub mod policy;
pub mod workers;

pub(crate) mod text;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use agent::Orchestrator;
pub use workers::{WorkerResult, WorkerResults};
