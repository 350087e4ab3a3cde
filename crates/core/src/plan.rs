//! Structured query plans and their validation.
//!
//! A plan arrives from the intent planner as raw JSON. The planner derives
//! it from natural language, so nothing about its shape can be trusted:
//! every required field is checked for presence and type before the
//! orchestrator acts on it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::PlanError;

// ---------------------------------------------------------------------------
// Query descriptor
// ---------------------------------------------------------------------------

/// An opaque, engine-specific read query with named parameters.
///
/// The statement text is passed through to the graph store; the core only
/// performs shape checks on it. Queries the core issues on its own behalf
/// never use this type directly — see [`crate::graph::templates`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphQuery {
    /// Query text in the graph store's own language.
    pub statement: String,
    /// Named parameters referenced by the statement.
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

impl GraphQuery {
    /// A query with no parameters.
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// A query with the given named parameters.
    pub fn with_params(
        statement: impl Into<String>,
        parameters: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        Self {
            statement: statement.into(),
            parameters,
        }
    }
}

// ---------------------------------------------------------------------------
// Plan
// ---------------------------------------------------------------------------

/// A validated request plan, consumed once by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPlan {
    /// Whether the request needs file contents (merge analysis).
    pub needs_blobs: bool,
    /// Branch names the planner identified in the question. Logged for
    /// traceability; endpoints come from the subgraph rows by contract.
    pub branches: Vec<String>,
    /// The graph read to execute.
    pub query: GraphQuery,
    /// Whether the question was specifically about the merge base, making
    /// `no_common_ancestor` a hard failure instead of a skipped comparison.
    #[serde(default)]
    pub require_merge_base: bool,
}

impl QueryPlan {
    /// Validate raw planner output into a usable plan.
    ///
    /// Required fields: `needs_blobs` (bool), `branches` (array of strings),
    /// `query` (object with a non-empty `statement`). Optional:
    /// `require_merge_base` (bool, default false).
    pub fn from_value(raw: serde_json::Value) -> Result<Self, PlanError> {
        let obj = match raw {
            serde_json::Value::Object(m) => m,
            serde_json::Value::Null => return Err(PlanError::NotAnObject("null")),
            serde_json::Value::Array(_) => return Err(PlanError::NotAnObject("an array")),
            serde_json::Value::String(_) => return Err(PlanError::NotAnObject("a string")),
            serde_json::Value::Bool(_) => return Err(PlanError::NotAnObject("a bool")),
            serde_json::Value::Number(_) => return Err(PlanError::NotAnObject("a number")),
        };

        let needs_blobs = obj
            .get("needs_blobs")
            .ok_or(PlanError::MissingField("needs_blobs"))?
            .as_bool()
            .ok_or(PlanError::WrongType {
                field: "needs_blobs",
                expected: "a boolean",
            })?;

        let branches_raw = obj
            .get("branches")
            .ok_or(PlanError::MissingField("branches"))?
            .as_array()
            .ok_or(PlanError::WrongType {
                field: "branches",
                expected: "an array of strings",
            })?;
        let mut branches = Vec::with_capacity(branches_raw.len());
        for b in branches_raw {
            let s = b.as_str().ok_or(PlanError::WrongType {
                field: "branches",
                expected: "an array of strings",
            })?;
            branches.push(s.to_string());
        }

        let query_raw = obj.get("query").ok_or(PlanError::MissingField("query"))?;
        let query: GraphQuery =
            serde_json::from_value(query_raw.clone()).map_err(|_| PlanError::WrongType {
                field: "query",
                expected: "an object with `statement` and optional `parameters`",
            })?;

        if query.statement.trim().is_empty() {
            return Err(PlanError::MalformedQuery(
                "query statement is empty".into(),
            ));
        }

        let require_merge_base = match obj.get("require_merge_base") {
            None => false,
            Some(v) => v.as_bool().ok_or(PlanError::WrongType {
                field: "require_merge_base",
                expected: "a boolean",
            })?,
        };

        debug!(
            needs_blobs,
            branches = ?branches,
            require_merge_base,
            "validated query plan"
        );

        Ok(Self {
            needs_blobs,
            branches,
            query,
            require_merge_base,
        })
    }
}
