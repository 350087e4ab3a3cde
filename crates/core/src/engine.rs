//! The query orchestrator.
//!
//! [`QueryEngine`] is the heart of the core. One request runs one state
//! machine:
//!
//! 1. Execute the plan's graph read.
//! 2. If the plan needs file contents, extract the source, target, and
//!    merge-base commit ids from the first subgraph row.
//! 3. Resolve the merge base natively when the row carries a null for it.
//! 4. Fetch the three blob sets concurrently, all-or-nothing.
//! 5. Classify every path three-ways and annotate auto-resolvable
//!    conflicts.
//!
//! The engine never retries and never returns a partial comparison; every
//! failure surfaces as a typed [`EngineError`].

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::blob::BlobStore;
use crate::config::EngineConfig;
use crate::conflict::{classify, try_auto_merge};
use crate::errors::{EngineError, ResolveError};
use crate::graph::GraphStore;
use crate::merge_base::MergeBaseResolver;
use crate::models::{
    BlobSet, FileVerdict, MergeAnalysis, Row, SkipReason, StructuredResult, Value,
};
use crate::plan::QueryPlan;
use crate::planner::IntentPlanner;

/// Subgraph column carrying the source-side commit id.
pub const FIELD_SOURCE: &str = "source_id";
/// Subgraph column carrying the target-side commit id.
pub const FIELD_TARGET: &str = "target_id";
/// Subgraph column carrying the merge-base commit id (may be null).
pub const FIELD_MERGE_BASE: &str = "merge_base_id";

// ---------------------------------------------------------------------------
// Request state machine
// ---------------------------------------------------------------------------

/// States of a single request. Terminal after `Done` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestState {
    Start,
    SubgraphFetched,
    ResolvingBase,
    FetchingBlobs,
    Comparing,
    Done,
}

impl std::fmt::Display for RequestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::SubgraphFetched => write!(f, "subgraph_fetched"),
            Self::ResolvingBase => write!(f, "resolving_base"),
            Self::FetchingBlobs => write!(f, "fetching_blobs"),
            Self::Comparing => write!(f, "comparing"),
            Self::Done => write!(f, "done"),
        }
    }
}

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Per-request resource bounds.
#[derive(Debug, Clone)]
pub struct EngineLimits {
    /// Maximum BFS rounds for native merge-base resolution.
    pub max_traversal_depth: u32,
    /// Wall-clock budget per request; unlimited when absent.
    pub request_timeout: Option<Duration>,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            max_traversal_depth: 1000,
            request_timeout: None,
        }
    }
}

impl From<&EngineConfig> for EngineLimits {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_traversal_depth: config.max_traversal_depth,
            request_timeout: config.request_timeout_secs.map(Duration::from_secs),
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The query orchestration engine.
///
/// Holds injected store handles; all per-request state lives on the stack
/// of [`QueryEngine::execute`], so one engine serves any number of
/// concurrent requests.
pub struct QueryEngine {
    graph: Arc<dyn GraphStore>,
    blobs: Arc<dyn BlobStore>,
    limits: EngineLimits,
}

impl QueryEngine {
    /// Create an engine over the given store handles.
    pub fn new(graph: Arc<dyn GraphStore>, blobs: Arc<dyn BlobStore>, limits: EngineLimits) -> Self {
        info!(
            max_traversal_depth = limits.max_traversal_depth,
            request_timeout = ?limits.request_timeout,
            "initializing query engine"
        );
        Self {
            graph,
            blobs,
            limits,
        }
    }

    /// Answer a free-form question: obtain a raw plan from the planner
    /// boundary, validate it, and execute it.
    pub async fn answer(
        &self,
        planner: &dyn IntentPlanner,
        question: &str,
    ) -> Result<StructuredResult, EngineError> {
        let raw = planner.plan(question).await.map_err(EngineError::Plan)?;
        let plan = QueryPlan::from_value(raw)?;
        self.execute(plan).await
    }

    /// Execute a validated plan to completion.
    pub async fn execute(&self, plan: QueryPlan) -> Result<StructuredResult, EngineError> {
        let request_id = Uuid::new_v4();
        let deadline = self.limits.request_timeout.map(|t| Instant::now() + t);
        let mut state = RequestState::Start;

        info!(
            %request_id,
            needs_blobs = plan.needs_blobs,
            branches = ?plan.branches,
            "executing query plan"
        );

        // 1. Graph read. Always happens, whatever the plan wants beyond it.
        let subgraph = self
            .bounded(deadline, "graph_read", self.graph.read(&plan.query))
            .await?;
        transition(request_id, &mut state, RequestState::SubgraphFetched);
        debug!(%request_id, rows = subgraph.len(), "subgraph fetched");

        if !plan.needs_blobs {
            transition(request_id, &mut state, RequestState::Done);
            return Ok(StructuredResult::subgraph_only(
                subgraph,
                SkipReason::NotRequested,
            ));
        }
        if subgraph.is_empty() {
            transition(request_id, &mut state, RequestState::Done);
            return Ok(StructuredResult::subgraph_only(
                subgraph,
                SkipReason::EmptySubgraph,
            ));
        }

        // 2. Endpoint extraction. First row wins when the query matched
        // more than one pair; see DESIGN.md.
        let (source_id, target_id, base_value) = {
            let row = &subgraph[0];
            (
                required_id(row, FIELD_SOURCE)?,
                required_id(row, FIELD_TARGET)?,
                row.get(FIELD_MERGE_BASE)
                    .cloned()
                    .ok_or(EngineError::IncompleteSubgraph {
                        field: FIELD_MERGE_BASE,
                    })?,
            )
        };

        // 3. Merge base: taken from the subgraph when the planner's query
        // produced it, resolved natively when the column is null.
        let (base_id, distances) = match base_value {
            Value::String(id) => (id, None),
            Value::Null => {
                transition(request_id, &mut state, RequestState::ResolvingBase);
                let resolver =
                    MergeBaseResolver::new(self.graph.as_ref(), self.limits.max_traversal_depth)
                        .with_deadline(deadline);
                match resolver.find(&source_id, &target_id).await {
                    Ok(base) => {
                        debug!(
                            %request_id,
                            base = %base.id,
                            distance_source = base.distance_source,
                            distance_target = base.distance_target,
                            "merge base resolved"
                        );
                        (
                            base.id.clone(),
                            Some((base.distance_source, base.distance_target)),
                        )
                    }
                    Err(ResolveError::NoCommonAncestor { .. }) if !plan.require_merge_base => {
                        info!(%request_id, "no common ancestor; comparison skipped");
                        transition(request_id, &mut state, RequestState::Done);
                        return Ok(StructuredResult::subgraph_only(
                            subgraph,
                            SkipReason::NoCommonAncestor,
                        ));
                    }
                    Err(e) => {
                        warn!(%request_id, error = %e, "merge-base resolution failed");
                        return Err(e.into());
                    }
                }
            }
            _ => {
                return Err(EngineError::IncompleteSubgraph {
                    field: FIELD_MERGE_BASE,
                })
            }
        };

        // 4. The three blob sets, concurrently. Any single failure fails
        // the request; a partial comparison is worse than none.
        transition(request_id, &mut state, RequestState::FetchingBlobs);
        let (source, target, base) = tokio::try_join!(
            self.fetch_blob_set(deadline, &source_id),
            self.fetch_blob_set(deadline, &target_id),
            self.fetch_blob_set(deadline, &base_id),
        )?;

        // 5. Classification plus the auto-merge preview on conflicts.
        transition(request_id, &mut state, RequestState::Comparing);
        let verdict = classify(&source, &target, &base);
        let auto_resolvable = annotate_auto_resolvable(&verdict, &source, &target, &base);

        info!(
            %request_id,
            paths = verdict.len(),
            conflicts = verdict
                .values()
                .filter(|v| **v == FileVerdict::Conflict)
                .count(),
            auto_resolvable = auto_resolvable.len(),
            "merge analysis complete"
        );
        transition(request_id, &mut state, RequestState::Done);

        Ok(StructuredResult {
            subgraph,
            comparison: Some(MergeAnalysis {
                source_id,
                target_id,
                base_id,
                distances,
                source,
                target,
                base,
                verdict,
                auto_resolvable,
            }),
            comparison_skipped: None,
        })
    }

    async fn fetch_blob_set(
        &self,
        deadline: Option<Instant>,
        commit_id: &str,
    ) -> Result<BlobSet, EngineError> {
        self.bounded(deadline, "blob_fetch", self.blobs.list_and_fetch(commit_id))
            .await
    }

    /// Run `fut` against the request deadline, mapping overrun to
    /// [`EngineError::Timeout`] with the phase that blew the budget.
    async fn bounded<T, E>(
        &self,
        deadline: Option<Instant>,
        phase: &'static str,
        fut: impl Future<Output = Result<T, E>>,
    ) -> Result<T, EngineError>
    where
        EngineError: From<E>,
    {
        match deadline {
            None => fut.await.map_err(EngineError::from),
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(EngineError::Timeout { phase });
                }
                match tokio::time::timeout(deadline - now, fut).await {
                    Ok(result) => result.map_err(EngineError::from),
                    Err(_) => Err(EngineError::Timeout { phase }),
                }
            }
        }
    }
}

fn transition(request_id: Uuid, state: &mut RequestState, to: RequestState) {
    debug!(%request_id, from = %state, to = %to, "state transition");
    *state = to;
}

fn required_id(row: &Row, field: &'static str) -> Result<String, EngineError> {
    row.get_str(field)
        .map(str::to_string)
        .ok_or(EngineError::IncompleteSubgraph { field })
}

/// Conflicted paths whose text versions still merge cleanly line by line.
/// Delete-versus-modify conflicts are never auto-resolvable.
fn annotate_auto_resolvable(
    verdict: &std::collections::BTreeMap<String, FileVerdict>,
    source: &BlobSet,
    target: &BlobSet,
    base: &BlobSet,
) -> Vec<String> {
    verdict
        .iter()
        .filter(|(_, v)| **v == FileVerdict::Conflict)
        .filter_map(|(path, _)| match (source.get(path), target.get(path)) {
            (Some(s), Some(t)) => {
                let b = base.get(path).map(Vec::as_slice).unwrap_or(b"");
                try_auto_merge(b, s, t).map(|_| path.clone())
            }
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    #[test]
    fn test_limits_from_config() {
        let config = EngineConfig {
            max_traversal_depth: 64,
            request_timeout_secs: Some(30),
            log_level: "info".into(),
        };
        let limits = EngineLimits::from(&config);
        assert_eq!(limits.max_traversal_depth, 64);
        assert_eq!(limits.request_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(RequestState::Start.to_string(), "start");
        assert_eq!(
            RequestState::SubgraphFetched.to_string(),
            "subgraph_fetched"
        );
        assert_eq!(RequestState::ResolvingBase.to_string(), "resolving_base");
        assert_eq!(RequestState::FetchingBlobs.to_string(), "fetching_blobs");
        assert_eq!(RequestState::Comparing.to_string(), "comparing");
        assert_eq!(RequestState::Done.to_string(), "done");
    }

    #[test]
    fn test_annotate_auto_resolvable_skips_delete_conflicts() {
        let mut verdict = std::collections::BTreeMap::new();
        verdict.insert("f".to_string(), FileVerdict::Conflict);
        let base: BlobSet = [("f".to_string(), b"old\n".to_vec())].into();
        let target: BlobSet = [("f".to_string(), b"edited\n".to_vec())].into();
        let source = BlobSet::new();
        assert!(annotate_auto_resolvable(&verdict, &source, &target, &base).is_empty());
    }
}
