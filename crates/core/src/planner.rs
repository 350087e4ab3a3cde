//! Intent planner boundary.
//!
//! The planner turns a free-form question into the raw JSON form of a
//! [`crate::plan::QueryPlan`]. How it does that (typically a language-model
//! call) is outside this core; the engine treats whatever comes back as
//! untrusted and validates it before use.

use async_trait::async_trait;

use crate::errors::PlanError;

/// External translation from natural language to a raw plan document.
#[async_trait]
pub trait IntentPlanner: Send + Sync {
    /// Produce raw plan JSON for `question`.
    ///
    /// Implementations should return [`PlanError::PlannerFailed`] when no
    /// plan can be produced at all; shape problems in a returned plan are
    /// caught by the engine's own validation.
    async fn plan(&self, question: &str) -> Result<serde_json::Value, PlanError>;
}
