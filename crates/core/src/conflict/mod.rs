//! Three-way comparison between two branch endpoints and their common
//! ancestor.
//!
//! [`classifier`] produces the byte-exact per-path verdict map;
//! [`merger`] adds a line-based auto-merge preview for conflicted text
//! files, feeding downstream resolution hints.

pub mod classifier;
pub mod merger;

pub use classifier::classify;
pub use merger::try_auto_merge;
