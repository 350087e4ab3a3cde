//! Domain model types used throughout the GraphVCS query core.
//!
//! These types bridge the store clients, the merge-analysis pipeline, and
//! the structured result handed to the narrator boundary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Row values
// ---------------------------------------------------------------------------

/// A scalar or identifier value in a graph query result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    /// The string payload, if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Self::String(s),
            // Nested structures are flattened to their JSON text; the engine
            // only consumes scalar fields.
            other => Self::String(other.to_string()),
        }
    }
}

/// One result row: a mapping from column name to scalar value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    pub fields: BTreeMap<String, Value>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a column by name.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Look up a column expected to hold a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(Value::as_str)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.fields.insert(field.into(), value);
    }
}

// ---------------------------------------------------------------------------
// Commits and blob sets
// ---------------------------------------------------------------------------

/// A commit node as read from the graph store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    /// Unique, immutable commit identifier.
    pub id: String,
    /// Commit message.
    pub message: String,
    /// Commit timestamp. Stored as text in the graph; must parse as an
    /// ordered instant.
    pub timestamp: DateTime<Utc>,
}

/// The files stored for one commit: relative path -> exact bytes.
///
/// `BTreeMap` keeps iteration deterministic, which the comparator and the
/// serialized result both rely on.
pub type BlobSet = BTreeMap<String, Vec<u8>>;

// ---------------------------------------------------------------------------
// Merge base
// ---------------------------------------------------------------------------

/// A resolved merge base with hop distances from each endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeBase {
    /// Identifier of the nearest common ancestor.
    pub id: String,
    /// PARENT-edge hops from the source commit.
    pub distance_source: u32,
    /// PARENT-edge hops from the target commit.
    pub distance_target: u32,
}

// ---------------------------------------------------------------------------
// File verdicts
// ---------------------------------------------------------------------------

/// Per-path classification from the three-way comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileVerdict {
    Unchanged,
    ChangedInSourceOnly,
    ChangedInTargetOnly,
    Conflict,
    AddedInSource,
    AddedInTarget,
    DeletedInSource,
    DeletedInTarget,
}

impl std::fmt::Display for FileVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unchanged => write!(f, "unchanged"),
            Self::ChangedInSourceOnly => write!(f, "changed_in_source_only"),
            Self::ChangedInTargetOnly => write!(f, "changed_in_target_only"),
            Self::Conflict => write!(f, "conflict"),
            Self::AddedInSource => write!(f, "added_in_source"),
            Self::AddedInTarget => write!(f, "added_in_target"),
            Self::DeletedInSource => write!(f, "deleted_in_source"),
            Self::DeletedInTarget => write!(f, "deleted_in_target"),
        }
    }
}

// ---------------------------------------------------------------------------
// Structured result
// ---------------------------------------------------------------------------

/// The three-way comparison produced when a plan requests file-level
/// analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeAnalysis {
    /// Source-side commit id (first branch endpoint).
    pub source_id: String,
    /// Target-side commit id (second branch endpoint).
    pub target_id: String,
    /// Common-ancestor commit id used as the comparison base.
    pub base_id: String,
    /// Hop distances (source, target) when the base was resolved natively;
    /// `None` when the planner's subgraph supplied the base directly.
    pub distances: Option<(u32, u32)>,
    /// Blob set at the source commit.
    pub source: BlobSet,
    /// Blob set at the target commit.
    pub target: BlobSet,
    /// Blob set at the base commit.
    pub base: BlobSet,
    /// Per-path classification over the union of all three blob sets.
    pub verdict: BTreeMap<String, FileVerdict>,
    /// Conflicted paths whose three text versions still merge cleanly line
    /// by line. Input for resolution hints downstream; the byte-exact
    /// verdict above is unaffected.
    pub auto_resolvable: Vec<String>,
}

/// Why a requested comparison was skipped without failing the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The plan did not request file contents.
    NotRequested,
    /// The graph query returned no rows to compare.
    EmptySubgraph,
    /// The endpoints share no ancestor and the plan did not require one.
    NoCommonAncestor,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotRequested => write!(f, "not_requested"),
            Self::EmptySubgraph => write!(f, "empty_subgraph"),
            Self::NoCommonAncestor => write!(f, "no_common_ancestor"),
        }
    }
}

/// The engine's output, handed as-is to the narrator boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredResult {
    /// Rows returned by the plan's graph query.
    pub subgraph: Vec<Row>,
    /// Three-way comparison, populated when the plan requested file-level
    /// analysis and it could be carried out.
    pub comparison: Option<MergeAnalysis>,
    /// Set exactly when `comparison` is absent.
    pub comparison_skipped: Option<SkipReason>,
}

impl StructuredResult {
    /// A result with no comparison and the given skip reason.
    pub fn subgraph_only(subgraph: Vec<Row>, reason: SkipReason) -> Self {
        Self {
            subgraph,
            comparison: None,
            comparison_skipped: Some(reason),
        }
    }
}
