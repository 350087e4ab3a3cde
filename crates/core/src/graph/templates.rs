//! The closed set of parameterized queries the core issues on its own
//! behalf.
//!
//! Plan queries arrive from outside and are opaque; everything the core
//! itself needs from the graph goes through these templates, with values
//! passed as named parameters rather than spliced into query text.

use std::collections::BTreeMap;

use crate::plan::GraphQuery;

/// PARENT edges for a batch of commits, one row per (child, parent) pair.
///
/// Ordered by child then parent id so adjacency lists come back in a fixed
/// order regardless of store internals.
pub fn parents_of(ids: &[String]) -> GraphQuery {
    let mut params = BTreeMap::new();
    params.insert("ids".to_string(), serde_json::json!(ids));
    GraphQuery::with_params(
        "MATCH (c:Commit)-[:PARENT]->(p:Commit) \
         WHERE c.id IN $ids \
         RETURN c.id AS child, p.id AS parent \
         ORDER BY child, parent",
        params,
    )
}

/// The commit a branch's HEAD points to.
pub fn head_of_branch(branch: &str) -> GraphQuery {
    let mut params = BTreeMap::new();
    params.insert("branch".to_string(), serde_json::json!(branch));
    GraphQuery::with_params(
        "MATCH (h:HEAD {branch: $branch})-[:POINTS_TO]->(c:Commit) \
         RETURN c.id AS id, c.message AS message, c.timestamp AS timestamp",
        params,
    )
}
