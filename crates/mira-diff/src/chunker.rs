//! Packs filtered files into token-budgeted review chunks.
//!
//! Each chunk is sized to fit comfortably inside the configured context
//! window, leaving headroom for the prompt's fixed system/user overhead.

use mira_core::{FileDiff, ReviewChunk};

/// Token overhead reserved for the review prompt's fixed system/user text,
/// leaving `max_context_tokens - PROMPT_OVERHEAD` for file content.
const PROMPT_OVERHEAD: usize = 2000;

/// Fallback chars-per-token ratio used when no tokenizer is supplied.
const CHARS_PER_TOKEN: usize = 4;

/// A function estimating the token count of a string, typically backed by
/// an LLM client's real tokenizer. `None` falls back to a fixed
/// chars-per-token ratio.
pub type TokenEstimator<'a> = dyn Fn(&str) -> usize + 'a;

/// Pack files into chunks that fit within `max_context_tokens`.
///
/// Files are sorted by estimated token size, descending, then placed with
/// first-fit bin packing. A file whose own estimate exceeds the budget is
/// emitted as its own chunk, with trailing hunks truncated until it fits —
/// always retaining at least the first hunk.
///
/// # Examples
///
/// ```
/// use mira_core::{ChangeType, FileDiff};
/// use mira_diff::chunker::chunk_files;
/// use std::path::PathBuf;
///
/// let file = FileDiff {
///     path: PathBuf::from("a.rs"),
///     change_type: ChangeType::Modified,
///     hunks: vec![],
///     language: "rust".into(),
///     old_path: None,
///     is_binary: false,
///     added_lines: 1,
///     deleted_lines: 0,
/// };
/// let chunks = chunk_files(vec![file], 10_000, None);
/// assert_eq!(chunks.len(), 1);
/// ```
pub fn chunk_files(
    mut files: Vec<FileDiff>,
    max_context_tokens: usize,
    estimator: Option<&TokenEstimator<'_>>,
) -> Vec<ReviewChunk> {
    let budget = max_context_tokens.saturating_sub(PROMPT_OVERHEAD).max(1);

    let estimate = |file: &FileDiff| -> usize {
        let content = file_content(file);
        match estimator {
            Some(f) => f(&content),
            None => content.len() / CHARS_PER_TOKEN + 1,
        }
    };

    let mut sized: Vec<(FileDiff, usize)> = files
        .drain(..)
        .map(|f| {
            let est = estimate(&f);
            (f, est)
        })
        .collect();
    sized.sort_by(|a, b| b.1.cmp(&a.1));

    let mut chunks: Vec<ReviewChunk> = Vec::new();

    for (mut file, mut est) in sized {
        if est > budget {
            while est > budget && file.hunks.len() > 1 {
                file.hunks.pop();
                est = estimate(&file);
            }
            chunks.push(ReviewChunk {
                files: vec![file],
                token_estimate: est,
            });
            continue;
        }

        if let Some(chunk) = chunks
            .iter_mut()
            .find(|c| c.token_estimate + est <= budget)
        {
            chunk.token_estimate += est;
            chunk.files.push(file);
        } else {
            chunks.push(ReviewChunk {
                files: vec![file],
                token_estimate: est,
            });
        }
    }

    chunks
}

fn file_content(file: &FileDiff) -> String {
    let mut content = String::new();
    content.push_str(&file.path.to_string_lossy());
    for hunk in &file.hunks {
        content.push_str(&hunk.content);
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;
    use mira_core::{ChangeType, HunkInfo};
    use std::path::PathBuf;

    fn file_with_content(path: &str, content_len: usize) -> FileDiff {
        FileDiff {
            path: PathBuf::from(path),
            change_type: ChangeType::Modified,
            hunks: vec![
                HunkInfo {
                    source_start: 1,
                    source_length: 1,
                    target_start: 1,
                    target_length: 1,
                    content: "x".repeat(content_len),
                },
                HunkInfo {
                    source_start: 10,
                    source_length: 1,
                    target_start: 10,
                    target_length: 1,
                    content: "y".repeat(10),
                },
            ],
            language: "rust".into(),
            old_path: None,
            is_binary: false,
            added_lines: 0,
            deleted_lines: 0,
        }
    }

    #[test]
    fn empty_input_produces_no_chunks() {
        let chunks = chunk_files(Vec::new(), 10_000, None);
        assert!(chunks.is_empty());
    }

    #[test]
    fn single_small_file_fits_one_chunk() {
        let file = file_with_content("a.rs", 40);
        let chunks = chunk_files(vec![file], 10_000, None);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].files.len(), 1);
    }

    #[test]
    fn several_small_files_pack_into_one_chunk() {
        let files = vec![
            file_with_content("a.rs", 40),
            file_with_content("b.rs", 40),
            file_with_content("c.rs", 40),
        ];
        let chunks = chunk_files(files, 10_000, None);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].files.len(), 3);
    }

    #[test]
    fn oversized_file_gets_its_own_chunk_and_is_truncated() {
        // budget = max_context_tokens - 2000; make a huge file that alone
        // exceeds it.
        let file = file_with_content("huge.rs", 50_000);
        let chunks = chunk_files(vec![file], 2100, None);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].files[0].hunks.len(), 1);
    }

    #[test]
    fn files_exceeding_remaining_capacity_open_new_chunk() {
        // Each file estimates to ~1503 tokens; a 2500-token budget admits
        // only one per chunk.
        let files = vec![
            file_with_content("a.rs", 6000),
            file_with_content("b.rs", 6000),
        ];
        let chunks = chunk_files(files, 4500, None);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn custom_estimator_is_used() {
        let file = file_with_content("a.rs", 40);
        let calls = std::cell::RefCell::new(0);
        let estimator = |_s: &str| {
            *calls.borrow_mut() += 1;
            5
        };
        let chunks = chunk_files(vec![file], 10_000, Some(&estimator));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].token_estimate, 5);
        assert!(*calls.borrow() >= 1);
    }
}
