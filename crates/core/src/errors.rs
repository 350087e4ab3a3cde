//! Error types for the GraphVCS core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and the
//! top-level [`EngineError`] unifies them for callers of the orchestrator.
//! Every error maps to a distinct, stable kind string via
//! [`EngineError::kind`]; callers must never receive a partial or ambiguous
//! result in place of one of these.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Graph store errors
// ---------------------------------------------------------------------------

/// Errors from the property-graph read client.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Transport, connection, or authentication failure.
    #[error("graph store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the query (malformed text, undefined fields).
    #[error("graph query rejected ({code}): {message}")]
    QueryRejected {
        code: String,
        message: String,
    },

    /// The store answered, but with a response shape we cannot interpret.
    #[error("malformed graph response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for GraphError {
    fn from(e: reqwest::Error) -> Self {
        GraphError::Unavailable(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Blob store errors
// ---------------------------------------------------------------------------

/// Errors from the per-commit blob store client.
///
/// A failure fetching any single file aborts the whole commit's retrieval,
/// so there is no partial-result variant.
#[derive(Debug, Error)]
pub enum BlobError {
    /// Transport failure on the listing or on any per-key fetch.
    #[error("blob store unavailable: {0}")]
    Unavailable(String),

    /// The listing response could not be parsed.
    #[error("malformed blob listing for '{prefix}': {detail}")]
    MalformedListing {
        prefix: String,
        detail: String,
    },
}

impl From<reqwest::Error> for BlobError {
    fn from(e: reqwest::Error) -> Self {
        BlobError::Unavailable(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Plan errors
// ---------------------------------------------------------------------------

/// Errors validating a structured plan received from the intent planner.
///
/// Plans cross a trust boundary: the planner's output is derived from
/// natural language and is validated field-by-field before use.
#[derive(Debug, Error)]
pub enum PlanError {
    /// A required field is absent.
    #[error("invalid plan: missing required field '{0}'")]
    MissingField(&'static str),

    /// A field is present but has the wrong type.
    #[error("invalid plan: field '{field}' must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    /// The query descriptor fails basic shape checks.
    #[error("invalid plan: {0}")]
    MalformedQuery(String),

    /// The plan document itself is not a JSON object.
    #[error("invalid plan: expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// The external planner failed to produce any plan at all.
    #[error("intent planner failed: {0}")]
    PlannerFailed(String),
}

// ---------------------------------------------------------------------------
// Merge-base resolver errors
// ---------------------------------------------------------------------------

/// Errors from the native merge-base search over PARENT edges.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The two commits belong to disjoint root sets.
    #[error("no common ancestor between '{a}' and '{b}'")]
    NoCommonAncestor {
        a: String,
        b: String,
    },

    /// Traversal exceeded the configured depth bound. The ancestry graph is
    /// expected to be a DAG; hitting this bound means corrupt (cyclic) or
    /// absurdly deep history.
    #[error("ancestry traversal exceeded depth limit {limit}")]
    DepthExceeded {
        limit: u32,
    },

    /// The request deadline expired during a traversal round.
    #[error("merge-base search timed out after round {round}")]
    Timeout {
        round: u32,
    },

    /// Underlying graph read failure during frontier expansion.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A required environment variable is not set.
    #[error("required environment variable '{var}' is not set (referenced by config field '{field}')")]
    EnvVarMissing {
        var: String,
        field: String,
    },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Engine error
// ---------------------------------------------------------------------------

/// Unified error type for the query orchestrator.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// The plan requested file-level analysis but the subgraph rows do not
    /// carry the contracted identifier fields.
    #[error("incomplete subgraph: missing or non-string field '{field}' in first row")]
    IncompleteSubgraph {
        field: &'static str,
    },

    /// The request deadline expired at a suspension point.
    #[error("request timed out during {phase}")]
    Timeout {
        phase: &'static str,
    },
}

impl EngineError {
    /// Stable machine-readable kind for this error.
    ///
    /// These strings are part of the engine's contract with callers and must
    /// not change between releases.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Graph(GraphError::Unavailable(_)) => "graph_unavailable",
            Self::Graph(GraphError::QueryRejected { .. }) => "query_rejected",
            Self::Graph(GraphError::MalformedResponse(_)) => "graph_unavailable",
            Self::Blob(_) => "blob_store_unavailable",
            Self::Plan(_) => "invalid_plan",
            Self::Resolve(ResolveError::NoCommonAncestor { .. }) => "no_common_ancestor",
            Self::Resolve(ResolveError::DepthExceeded { .. }) => "traversal_depth_exceeded",
            Self::Resolve(ResolveError::Timeout { .. }) => "timeout",
            Self::Resolve(ResolveError::Graph(GraphError::QueryRejected { .. })) => {
                "query_rejected"
            }
            Self::Resolve(ResolveError::Graph(_)) => "graph_unavailable",
            Self::IncompleteSubgraph { .. } => "incomplete_subgraph",
            Self::Timeout { .. } => "timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = GraphError::QueryRejected {
            code: "Neo.ClientError.Statement.SyntaxError".into(),
            message: "Invalid input".into(),
        };
        assert!(err.to_string().contains("rejected"));

        let err = ResolveError::NoCommonAncestor {
            a: "c1".into(),
            b: "c9".into(),
        };
        assert_eq!(err.to_string(), "no common ancestor between 'c1' and 'c9'");

        let err = EngineError::IncompleteSubgraph { field: "merge_base_id" };
        assert!(err.to_string().contains("merge_base_id"));
    }

    #[test]
    fn test_kind_strings_are_distinct_and_stable() {
        let kinds = [
            EngineError::Graph(GraphError::Unavailable("down".into())).kind(),
            EngineError::Graph(GraphError::QueryRejected {
                code: "x".into(),
                message: "y".into(),
            })
            .kind(),
            EngineError::Blob(BlobError::Unavailable("down".into())).kind(),
            EngineError::Plan(PlanError::MissingField("query")).kind(),
            EngineError::Resolve(ResolveError::NoCommonAncestor {
                a: "a".into(),
                b: "b".into(),
            })
            .kind(),
            EngineError::Resolve(ResolveError::DepthExceeded { limit: 10 }).kind(),
            EngineError::IncompleteSubgraph { field: "source_id" }.kind(),
            EngineError::Timeout { phase: "graph_read" }.kind(),
        ];
        assert_eq!(
            kinds,
            [
                "graph_unavailable",
                "query_rejected",
                "blob_store_unavailable",
                "invalid_plan",
                "no_common_ancestor",
                "traversal_depth_exceeded",
                "incomplete_subgraph",
                "timeout",
            ]
        );
    }
}
