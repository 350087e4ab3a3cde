//! Property-graph store access.
//!
//! [`GraphStore`] is the read-only seam the orchestrator and the merge-base
//! resolver depend on; [`HttpGraphClient`] is the production implementation
//! against the graph database's HTTP transaction endpoint.

pub mod client;
pub mod templates;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::errors::GraphError;
use crate::models::{Commit, Row};
use crate::plan::GraphQuery;

/// Read-only access to the commit/branch property graph.
///
/// Implementations are shared across concurrent requests and must be cheap
/// to call repeatedly; the core never writes through this interface.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Execute a read query and return every result row, untruncated.
    async fn read(&self, query: &GraphQuery) -> Result<Vec<Row>, GraphError>;

    /// PARENT adjacency for a batch of commit ids.
    ///
    /// Commits absent from the returned map have no PARENT edges (roots).
    /// Parent lists are sorted by id so traversal order is reproducible.
    async fn parents_of(
        &self,
        ids: &[String],
    ) -> Result<BTreeMap<String, Vec<String>>, GraphError>;

    /// The commit a branch's HEAD currently points to, if the branch exists.
    async fn head_commit(&self, branch: &str) -> Result<Option<Commit>, GraphError>;
}

pub use client::HttpGraphClient;
