//! Per-commit blob store access.
//!
//! Each commit's files live under a `<commitId>/` namespace prefix in an
//! S3-compatible bucket. [`BlobStore`] is the seam the orchestrator uses;
//! [`S3BlobClient`] is the production implementation.

pub mod client;
pub mod sigv4;

use async_trait::async_trait;

use crate::errors::BlobError;
use crate::models::BlobSet;

/// Read-only access to per-commit blob sets.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List every key under `commitId/` and fetch its content, returning a
    /// path → bytes map with the namespace prefix stripped.
    ///
    /// An absent namespace yields an empty map. A transport failure on the
    /// listing or on any single fetch fails the whole call; callers never
    /// see a commit's files half-populated.
    async fn list_and_fetch(&self, commit_id: &str) -> Result<BlobSet, BlobError>;
}

pub use client::S3BlobClient;
