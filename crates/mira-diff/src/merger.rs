//! Merges adjacent hunks within a file whose context windows overlap.
//!
//! Reviewing two hunks three lines apart separately wastes tokens repeating
//! context the model already saw; merging them into one hunk keeps the
//! diff coherent for the LLM without re-parsing the whole file.

use mira_core::{FileDiff, HunkInfo};

/// Merge overlapping-context hunks across every file in place.
///
/// For a file with two or more hunks, sorted by `target_start`, hunk *j* is
/// merged into the previous one when
/// `hunk_j.target_start - context_lines <= prev.target_end() + context_lines`.
/// The merged hunk's content is the concatenation of both, separated by a
/// newline; its `target_length` spans from the earlier `target_start` to
/// `max(prev_end, hunk_end)`. Source ranges are summed — an approximation,
/// since the merged hunk's exact source range isn't used downstream.
///
/// # Examples
///
/// ```
/// use mira_core::{ChangeType, FileDiff, HunkInfo};
/// use mira_diff::merger::merge_hunks;
/// use std::path::PathBuf;
///
/// let mut file = FileDiff {
///     path: PathBuf::from("a.rs"),
///     change_type: ChangeType::Modified,
///     hunks: vec![
///         HunkInfo { source_start: 1, source_length: 2, target_start: 1, target_length: 2, content: "@@ -1,2 +1,2 @@\n a\n".into() },
///         HunkInfo { source_start: 5, source_length: 2, target_start: 5, target_length: 2, content: "@@ -5,2 +5,2 @@\n b\n".into() },
///     ],
///     language: "rust".into(),
///     old_path: None,
///     is_binary: false,
///     added_lines: 0,
///     deleted_lines: 0,
/// };
/// merge_hunks(&mut file, 3);
/// assert_eq!(file.hunks.len(), 1);
/// ```
pub fn merge_hunks(file: &mut FileDiff, context_lines: u32) {
    if file.hunks.len() < 2 {
        return;
    }

    file.hunks.sort_by_key(|h| h.target_start);

    let mut merged: Vec<HunkInfo> = Vec::with_capacity(file.hunks.len());
    for hunk in file.hunks.drain(..) {
        match merged.last_mut() {
            Some(prev) if should_merge(prev, &hunk, context_lines) => {
                merge_into(prev, &hunk);
            }
            _ => merged.push(hunk),
        }
    }

    file.hunks = merged;
}

fn should_merge(prev: &HunkInfo, next: &HunkInfo, context_lines: u32) -> bool {
    let next_start = next.target_start.saturating_sub(context_lines);
    let prev_end = prev.target_end() + context_lines;
    next_start <= prev_end
}

fn merge_into(prev: &mut HunkInfo, next: &HunkInfo) {
    let prev_end = prev.target_end();
    let next_end = next.target_end();

    prev.source_length += next.source_length;
    prev.target_length = (prev_end.max(next_end) + 1).saturating_sub(prev.target_start);

    if !prev.content.ends_with('\n') {
        prev.content.push('\n');
    }
    prev.content.push_str(&next.content);
}

#[cfg(test)]
mod tests {
    use super::*;
    use mira_core::ChangeType;
    use std::path::PathBuf;

    fn file_with(hunks: Vec<HunkInfo>) -> FileDiff {
        FileDiff {
            path: PathBuf::from("a.rs"),
            change_type: ChangeType::Modified,
            hunks,
            language: "rust".into(),
            old_path: None,
            is_binary: false,
            added_lines: 0,
            deleted_lines: 0,
        }
    }

    fn hunk(target_start: u32, target_length: u32, content: &str) -> HunkInfo {
        HunkInfo {
            source_start: target_start,
            source_length: target_length,
            target_start,
            target_length,
            content: content.into(),
        }
    }

    #[test]
    fn single_hunk_untouched() {
        let mut file = file_with(vec![hunk(1, 3, "one\n")]);
        merge_hunks(&mut file, 3);
        assert_eq!(file.hunks.len(), 1);
    }

    #[test]
    fn adjacent_hunks_merge_within_context() {
        // prev ends at line 5, next starts at line 8: gap of 2 <= context 3.
        let mut file = file_with(vec![hunk(1, 5, "first\n"), hunk(8, 2, "second\n")]);
        merge_hunks(&mut file, 3);
        assert_eq!(file.hunks.len(), 1);
        assert!(file.hunks[0].content.contains("first"));
        assert!(file.hunks[0].content.contains("second"));
        assert_eq!(file.hunks[0].target_start, 1);
    }

    #[test]
    fn distant_hunks_stay_separate() {
        // prev ends at line 5, next starts at line 50: far beyond context.
        let mut file = file_with(vec![hunk(1, 5, "first\n"), hunk(50, 2, "second\n")]);
        merge_hunks(&mut file, 3);
        assert_eq!(file.hunks.len(), 2);
    }

    #[test]
    fn three_hunks_chain_merge() {
        let mut file = file_with(vec![
            hunk(1, 2, "a\n"),
            hunk(4, 2, "b\n"),
            hunk(7, 2, "c\n"),
        ]);
        merge_hunks(&mut file, 3);
        assert_eq!(file.hunks.len(), 1);
        assert!(file.hunks[0].content.contains('a'));
        assert!(file.hunks[0].content.contains('b'));
        assert!(file.hunks[0].content.contains('c'));
    }

    #[test]
    fn out_of_order_hunks_sorted_before_merge() {
        let mut file = file_with(vec![hunk(8, 2, "second\n"), hunk(1, 5, "first\n")]);
        merge_hunks(&mut file, 3);
        assert_eq!(file.hunks.len(), 1);
        assert_eq!(file.hunks[0].target_start, 1);
    }

    #[test]
    fn no_hunks_is_noop() {
        let mut file = file_with(vec![]);
        merge_hunks(&mut file, 3);
        assert!(file.hunks.is_empty());
    }
}
