//! Native merge-base (lowest common ancestor) resolution over PARENT edges.
//!
//! Runs a bidirectional breadth-first search from both endpoints. The two
//! frontiers expand one hop per round through a single batched adjacency
//! read, which keeps the rounds synchronized: intersection is only tested
//! after both sides have finished a hop, so the distance-based tie-break is
//! deterministic.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, instrument};

use crate::errors::ResolveError;
use crate::graph::GraphStore;
use crate::models::MergeBase;

/// Bidirectional BFS merge-base search.
pub struct MergeBaseResolver<'a> {
    graph: &'a dyn GraphStore,
    max_depth: u32,
    deadline: Option<Instant>,
}

impl<'a> MergeBaseResolver<'a> {
    /// Create a resolver bounded to `max_depth` rounds.
    pub fn new(graph: &'a dyn GraphStore, max_depth: u32) -> Self {
        Self {
            graph,
            max_depth,
            deadline: None,
        }
    }

    /// Abort with a timeout once `deadline` passes. Checked at every round.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Find the nearest common ancestor of `source` and `target`.
    ///
    /// The winner is the first commit visited by both frontiers in
    /// increasing combined-distance order; ties break by earliest
    /// discovery, with expansion order fixed by sorted commit ids. The
    /// search runs past the first candidate until no later round could
    /// produce a lower or equal combined distance.
    #[instrument(skip(self))]
    pub async fn find(&self, source: &str, target: &str) -> Result<MergeBase, ResolveError> {
        if source == target {
            return Ok(MergeBase {
                id: source.to_string(),
                distance_source: 0,
                distance_target: 0,
            });
        }

        // Minimum hop distance per commit, per side, plus a global discovery
        // sequence for the tie-break.
        let mut dist_source: HashMap<String, u32> = HashMap::new();
        let mut dist_target: HashMap<String, u32> = HashMap::new();
        let mut discovery: HashMap<String, u64> = HashMap::new();
        let mut next_seq: u64 = 0;

        dist_source.insert(source.to_string(), 0);
        discovery.insert(source.to_string(), next_seq);
        next_seq += 1;
        dist_target.insert(target.to_string(), 0);
        discovery.insert(target.to_string(), next_seq);
        next_seq += 1;

        let mut frontier_source = vec![source.to_string()];
        let mut frontier_target = vec![target.to_string()];

        // (combined, discovery_seq, id, d_source, d_target)
        let mut best: Option<(u32, u64, String, u32, u32)> = None;

        let mut round: u32 = 0;
        while round < self.max_depth {
            round += 1;

            if frontier_source.is_empty() && frontier_target.is_empty() {
                break;
            }
            // A commit first visited in round r sits at combined distance
            // >= r, so nothing from this round onward can beat or tie an
            // already-found candidate once r exceeds its combined distance.
            if let Some((combined, ..)) = best {
                if round > combined {
                    break;
                }
            }
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    return Err(ResolveError::Timeout { round });
                }
            }

            // One batched adjacency read serves both frontiers this round.
            let mut batch: Vec<String> = frontier_source
                .iter()
                .chain(frontier_target.iter())
                .cloned()
                .collect();
            batch.sort();
            batch.dedup();
            let adjacency = self.graph.parents_of(&batch).await?;

            frontier_source = expand(
                &frontier_source,
                &adjacency,
                round,
                &mut dist_source,
                &mut discovery,
                &mut next_seq,
            );
            frontier_target = expand(
                &frontier_target,
                &adjacency,
                round,
                &mut dist_target,
                &mut discovery,
                &mut next_seq,
            );

            for (id, d_source) in &dist_source {
                if let Some(d_target) = dist_target.get(id) {
                    let combined = d_source + d_target;
                    let seq = discovery[id];
                    let candidate = (combined, seq, id.clone(), *d_source, *d_target);
                    let better = match &best {
                        None => true,
                        Some(current) => (combined, seq) < (current.0, current.1),
                    };
                    if better {
                        debug!(id = %id, combined, "merge-base candidate");
                        best = Some(candidate);
                    }
                }
            }
        }

        match best {
            Some((_, _, id, d_source, d_target)) => Ok(MergeBase {
                id,
                distance_source: d_source,
                distance_target: d_target,
            }),
            None if frontier_source.is_empty() && frontier_target.is_empty() => {
                Err(ResolveError::NoCommonAncestor {
                    a: source.to_string(),
                    b: target.to_string(),
                })
            }
            None => Err(ResolveError::DepthExceeded {
                limit: self.max_depth,
            }),
        }
    }
}

/// Advance one frontier a single hop, recording first-visit distances and
/// discovery order. Returns the next frontier, sorted.
fn expand(
    frontier: &[String],
    adjacency: &std::collections::BTreeMap<String, Vec<String>>,
    round: u32,
    dist: &mut HashMap<String, u32>,
    discovery: &mut HashMap<String, u64>,
    next_seq: &mut u64,
) -> Vec<String> {
    let mut next = Vec::new();
    for id in frontier {
        let Some(parents) = adjacency.get(id) else {
            continue;
        };
        for parent in parents {
            if !dist.contains_key(parent) {
                dist.insert(parent.clone(), round);
                discovery.entry(parent.clone()).or_insert_with(|| {
                    let seq = *next_seq;
                    *next_seq += 1;
                    seq
                });
                next.push(parent.clone());
            }
        }
    }
    next.sort();
    next.dedup();
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use async_trait::async_trait;

    use crate::errors::GraphError;
    use crate::models::{Commit, Row};
    use crate::plan::GraphQuery;

    /// Adjacency-map graph store for resolver tests.
    struct AdjacencyGraph {
        parents: BTreeMap<String, Vec<String>>,
    }

    impl AdjacencyGraph {
        fn new(edges: &[(&str, &[&str])]) -> Self {
            let parents = edges
                .iter()
                .map(|(child, parents)| {
                    (
                        child.to_string(),
                        parents.iter().map(|p| p.to_string()).collect(),
                    )
                })
                .collect();
            Self { parents }
        }
    }

    #[async_trait]
    impl GraphStore for AdjacencyGraph {
        async fn read(&self, _query: &GraphQuery) -> Result<Vec<Row>, GraphError> {
            Ok(Vec::new())
        }

        async fn parents_of(
            &self,
            ids: &[String],
        ) -> Result<BTreeMap<String, Vec<String>>, GraphError> {
            Ok(ids
                .iter()
                .filter_map(|id| {
                    self.parents
                        .get(id)
                        .map(|parents| (id.clone(), parents.clone()))
                })
                .collect())
        }

        async fn head_commit(&self, _branch: &str) -> Result<Option<Commit>, GraphError> {
            Ok(None)
        }
    }

    async fn find(
        graph: &AdjacencyGraph,
        a: &str,
        b: &str,
    ) -> Result<MergeBase, ResolveError> {
        MergeBaseResolver::new(graph, 100).find(a, b).await
    }

    #[tokio::test]
    async fn test_same_commit_is_its_own_base() {
        let graph = AdjacencyGraph::new(&[("a", &["root"])]);
        let base = find(&graph, "a", "a").await.unwrap();
        assert_eq!(base.id, "a");
        assert_eq!((base.distance_source, base.distance_target), (0, 0));
    }

    #[tokio::test]
    async fn test_linear_chain_ancestor() {
        // a -> b -> c (b is a's parent, c is b's parent); heads at c and b.
        let graph = AdjacencyGraph::new(&[("c", &["b"]), ("b", &["a"])]);
        let base = find(&graph, "c", "b").await.unwrap();
        assert_eq!(base.id, "b");
        assert_eq!((base.distance_source, base.distance_target), (1, 0));
    }

    #[tokio::test]
    async fn test_diverged_branches() {
        //      root
        //     /    \
        //   f1      m1
        //   |        |
        //   f2      m2
        let graph = AdjacencyGraph::new(&[
            ("f2", &["f1"]),
            ("f1", &["root"]),
            ("m2", &["m1"]),
            ("m1", &["root"]),
        ]);
        let base = find(&graph, "f2", "m2").await.unwrap();
        assert_eq!(base.id, "root");
        assert_eq!((base.distance_source, base.distance_target), (2, 2));
    }

    #[tokio::test]
    async fn test_symmetry() {
        let graph = AdjacencyGraph::new(&[
            ("f2", &["f1"]),
            ("f1", &["root"]),
            ("m1", &["root"]),
        ]);
        let ab = find(&graph, "f2", "m1").await.unwrap();
        let ba = find(&graph, "m1", "f2").await.unwrap();
        assert_eq!(ab.id, ba.id);
        assert_eq!(ab.distance_source, ba.distance_target);
        assert_eq!(ab.distance_target, ba.distance_source);
    }

    #[tokio::test]
    async fn test_disjoint_roots() {
        let graph = AdjacencyGraph::new(&[("a", &["ra"]), ("b", &["rb"])]);
        let err = find(&graph, "a", "b").await.unwrap_err();
        assert!(matches!(err, ResolveError::NoCommonAncestor { .. }));
    }

    #[tokio::test]
    async fn test_merge_commit_multiple_parents() {
        // m is a merge commit with parents p1 and p2; x descends from p2.
        let graph = AdjacencyGraph::new(&[
            ("m", &["p1", "p2"]),
            ("p1", &["root"]),
            ("p2", &["root"]),
            ("x", &["p2"]),
        ]);
        let base = find(&graph, "m", "x").await.unwrap();
        assert_eq!(base.id, "p2");
        assert_eq!((base.distance_source, base.distance_target), (1, 1));
    }

    #[tokio::test]
    async fn test_depth_bound_on_long_chain() {
        // A chain deeper than the round limit on one side, nothing shared.
        let mut edges: Vec<(String, Vec<String>)> = Vec::new();
        for i in 0..50 {
            edges.push((format!("n{}", i), vec![format!("n{}", i + 1)]));
        }
        let parents: BTreeMap<String, Vec<String>> = edges.into_iter().collect();
        let graph = AdjacencyGraph { parents };
        let err = MergeBaseResolver::new(&graph, 10)
            .find("n0", "other")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::DepthExceeded { limit: 10 }));
    }

    #[tokio::test]
    async fn test_cyclic_graph_terminates() {
        // Corrupt input: a 3-cycle disjoint from the other endpoint. The
        // visited set drains the frontier in finite rounds.
        let graph = AdjacencyGraph::new(&[
            ("a", &["b"]),
            ("b", &["c"]),
            ("c", &["a"]),
            ("z", &[]),
        ]);
        let err = find(&graph, "a", "z").await.unwrap_err();
        assert!(matches!(err, ResolveError::NoCommonAncestor { .. }));
    }

    #[tokio::test]
    async fn test_expired_deadline_times_out() {
        let graph = AdjacencyGraph::new(&[("a", &["root"]), ("b", &["root"])]);
        let err = MergeBaseResolver::new(&graph, 100)
            .with_deadline(Some(Instant::now() - std::time::Duration::from_secs(1)))
            .find("a", "b")
            .await
            .unwrap_err();
        assert!(matches!(err, ResolveError::Timeout { .. }));
    }
}
