//! Per-path three-way classification.
//!
//! Every path in the union of the source, target, and base blob sets gets
//! exactly one verdict. Equality is exact byte-for-byte comparison; there
//! is no semantic or whitespace-tolerant diffing here.

use std::collections::BTreeMap;

use tracing::debug;

use crate::models::{BlobSet, FileVerdict};

/// Classify every path across the three blob sets.
///
/// Rules, per path:
/// - in base, untouched on both sides → `Unchanged`
/// - in base, changed on exactly one side → that side's changed-only verdict
/// - in base, changed on both sides → `Unchanged` when both made the same
///   edit (convergent), `Conflict` otherwise
/// - in base, deleted on one side, untouched on the other → that side's
///   deleted verdict; deleted on one side but *changed* on the other →
///   `Conflict`; deleted on both → `Unchanged` (convergent deletion)
/// - absent from base, added on one side → that side's added verdict
/// - absent from base, added on both sides → `Unchanged` when identical,
///   `Conflict` otherwise
pub fn classify(
    source: &BlobSet,
    target: &BlobSet,
    base: &BlobSet,
) -> BTreeMap<String, FileVerdict> {
    let mut verdict = BTreeMap::new();

    let paths = source
        .keys()
        .chain(target.keys())
        .chain(base.keys());
    for path in paths {
        if verdict.contains_key(path) {
            continue;
        }
        let v = classify_path(source.get(path), target.get(path), base.get(path));
        verdict.insert(path.clone(), v);
    }

    debug!(
        paths = verdict.len(),
        conflicts = verdict
            .values()
            .filter(|v| **v == FileVerdict::Conflict)
            .count(),
        "three-way classification complete"
    );
    verdict
}

fn classify_path(
    source: Option<&Vec<u8>>,
    target: Option<&Vec<u8>>,
    base: Option<&Vec<u8>>,
) -> FileVerdict {
    match (base, source, target) {
        // Path existed at the common ancestor.
        (Some(b), Some(s), Some(t)) => {
            let source_changed = s != b;
            let target_changed = t != b;
            match (source_changed, target_changed) {
                (false, false) => FileVerdict::Unchanged,
                (true, false) => FileVerdict::ChangedInSourceOnly,
                (false, true) => FileVerdict::ChangedInTargetOnly,
                (true, true) if s == t => FileVerdict::Unchanged,
                (true, true) => FileVerdict::Conflict,
            }
        }
        (Some(b), None, Some(t)) => {
            if t == b {
                FileVerdict::DeletedInSource
            } else {
                FileVerdict::Conflict
            }
        }
        (Some(b), Some(s), None) => {
            if s == b {
                FileVerdict::DeletedInTarget
            } else {
                FileVerdict::Conflict
            }
        }
        (Some(_), None, None) => FileVerdict::Unchanged,

        // Path did not exist at the common ancestor.
        (None, Some(s), Some(t)) => {
            if s == t {
                FileVerdict::Unchanged
            } else {
                FileVerdict::Conflict
            }
        }
        (None, Some(_), None) => FileVerdict::AddedInSource,
        (None, None, Some(_)) => FileVerdict::AddedInTarget,

        // The union of the three maps never yields a path absent from all.
        (None, None, None) => unreachable!("path present in no blob set"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(files: &[(&str, &str)]) -> BlobSet {
        files
            .iter()
            .map(|(path, content)| (path.to_string(), content.as_bytes().to_vec()))
            .collect()
    }

    #[test]
    fn test_identical_everywhere_is_unchanged() {
        let all = set(&[("f.txt", "same")]);
        let verdict = classify(&all, &all, &all);
        assert_eq!(verdict["f.txt"], FileVerdict::Unchanged);
    }

    #[test]
    fn test_both_changed_differently_is_conflict() {
        let source = set(&[("f.txt", "hello")]);
        let target = set(&[("f.txt", "world")]);
        let base = set(&[("f.txt", "hi")]);
        let verdict = classify(&source, &target, &base);
        assert_eq!(verdict["f.txt"], FileVerdict::Conflict);
    }

    #[test]
    fn test_single_side_changes() {
        let base = set(&[("a", "0"), ("b", "0")]);
        let source = set(&[("a", "1"), ("b", "0")]);
        let target = set(&[("a", "0"), ("b", "2")]);
        let verdict = classify(&source, &target, &base);
        assert_eq!(verdict["a"], FileVerdict::ChangedInSourceOnly);
        assert_eq!(verdict["b"], FileVerdict::ChangedInTargetOnly);
    }

    #[test]
    fn test_convergent_edit_is_unchanged() {
        let base = set(&[("f", "old")]);
        let both = set(&[("f", "new")]);
        let verdict = classify(&both, &both, &base);
        assert_eq!(verdict["f"], FileVerdict::Unchanged);
    }

    #[test]
    fn test_additions() {
        let base = BlobSet::new();
        let source = set(&[("s", "x")]);
        let target = set(&[("t", "y")]);
        let verdict = classify(&source, &target, &base);
        assert_eq!(verdict["s"], FileVerdict::AddedInSource);
        assert_eq!(verdict["t"], FileVerdict::AddedInTarget);
    }

    #[test]
    fn test_both_added_same_is_unchanged_differing_is_conflict() {
        let base = BlobSet::new();
        let source = set(&[("same", "x"), ("diff", "a")]);
        let target = set(&[("same", "x"), ("diff", "b")]);
        let verdict = classify(&source, &target, &base);
        assert_eq!(verdict["same"], FileVerdict::Unchanged);
        assert_eq!(verdict["diff"], FileVerdict::Conflict);
    }

    #[test]
    fn test_deletions() {
        let base = set(&[("gone_src", "v"), ("gone_tgt", "v"), ("gone_both", "v")]);
        let source = set(&[("gone_tgt", "v")]);
        let target = set(&[("gone_src", "v")]);
        let verdict = classify(&source, &target, &base);
        assert_eq!(verdict["gone_src"], FileVerdict::DeletedInSource);
        assert_eq!(verdict["gone_tgt"], FileVerdict::DeletedInTarget);
        assert_eq!(verdict["gone_both"], FileVerdict::Unchanged);
    }

    #[test]
    fn test_delete_vs_modify_is_conflict() {
        let base = set(&[("f", "old")]);
        let source = BlobSet::new();
        let target = set(&[("f", "edited")]);
        let verdict = classify(&source, &target, &base);
        assert_eq!(verdict["f"], FileVerdict::Conflict);
    }

    #[test]
    fn test_byte_exact_comparison() {
        // Trailing whitespace counts.
        let base = set(&[("f", "line\n")]);
        let source = set(&[("f", "line \n")]);
        let target = set(&[("f", "line\n")]);
        let verdict = classify(&source, &target, &base);
        assert_eq!(verdict["f"], FileVerdict::ChangedInSourceOnly);
    }
}
