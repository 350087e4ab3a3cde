//! GraphVCS core library.
//!
//! This crate provides the query orchestration and merge-analysis engine
//! for a VCS whose history lives in a property graph and whose file
//! contents live in a per-commit blob store: store clients, native
//! merge-base resolution, three-way comparison, and the orchestrator that
//! ties them together.

pub mod blob;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod merge_base;
pub mod models;
pub mod plan;
pub mod planner;

// Re-exports for convenience.
pub use config::AppConfig;
pub use engine::{EngineLimits, QueryEngine};
pub use models::StructuredResult;
pub use plan::QueryPlan;
pub use planner::IntentPlanner;
