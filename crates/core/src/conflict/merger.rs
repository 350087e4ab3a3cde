//! Line-based auto-merge preview for conflicted paths.
//!
//! The classifier's verdict is byte-exact: both sides changing a file in
//! different ways is a `Conflict`, full stop. Many such conflicts still
//! merge cleanly line by line (the edits touch disjoint regions). This
//! module answers that narrower question with the `diffy` crate so the
//! narrator can distinguish "needs a human" from "a merge tool would take
//! care of it". Binary content is never considered mergeable.

use tracing::debug;

/// Attempt a clean three-way line merge of a conflicted path.
///
/// Returns the merged text when the merge is conflict-free, `None` when
/// the regions genuinely overlap or any version is not valid UTF-8.
pub fn try_auto_merge(base: &[u8], source: &[u8], target: &[u8]) -> Option<String> {
    let base = std::str::from_utf8(base).ok()?;
    let source = std::str::from_utf8(source).ok()?;
    let target = std::str::from_utf8(target).ok()?;

    // Fast paths: one side untouched, or both sides made the same edit.
    if source == base {
        return Some(target.to_string());
    }
    if target == base {
        return Some(source.to_string());
    }
    if source == target {
        return Some(source.to_string());
    }

    // Apply each side's patch onto the other; either direction succeeding
    // cleanly means the edits do not overlap.
    let patch_target = diffy::create_patch(base, target);
    if let Ok(merged) = diffy::apply(source, &patch_target) {
        debug!("clean merge via applying target-patch to source");
        return Some(merged);
    }

    let patch_source = diffy::create_patch(base, source);
    if let Ok(merged) = diffy::apply(target, &patch_source) {
        debug!("clean merge via applying source-patch to target");
        return Some(merged);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_side_untouched_merges_to_other() {
        let base = b"line1\nline2\nline3\n";
        let target = b"line1\nmodified\nline3\n";
        let merged = try_auto_merge(base, base, target).unwrap();
        assert_eq!(merged, "line1\nmodified\nline3\n");
    }

    #[test]
    fn test_identical_edits_merge() {
        let base = b"old\n";
        let both = b"new\n";
        assert_eq!(try_auto_merge(base, both, both).unwrap(), "new\n");
    }

    #[test]
    fn test_non_overlapping_edits_merge() {
        let base = b"aaa\nbbb\nccc\nddd\neee\nfff\nggg\nhhh\n";
        let source = b"AAA\nbbb\nccc\nddd\neee\nfff\nggg\nhhh\n";
        let target = b"aaa\nbbb\nccc\nddd\neee\nfff\nggg\nHHH\n";
        let merged = try_auto_merge(base, source, target).unwrap();
        assert!(merged.contains("AAA"));
        assert!(merged.contains("HHH"));
    }

    #[test]
    fn test_overlapping_edits_do_not_merge() {
        let base = b"line1\noriginal\nline3\n";
        let source = b"line1\nsource_version\nline3\n";
        let target = b"line1\ntarget_version\nline3\n";
        assert!(try_auto_merge(base, source, target).is_none());
    }

    #[test]
    fn test_binary_content_never_merges() {
        let base = &[0u8, 159, 146, 150];
        let source = b"text";
        let target = b"other";
        assert!(try_auto_merge(base, source, target).is_none());
    }
}
