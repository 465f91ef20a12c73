//! Ties the pipeline together: parse → filter → walkthrough → chunk →
//! per-chunk review → classify → noise-filter → assemble.

use std::collections::HashSet;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use mira_core::{
    FileDiff, MiraConfig, MiraError, PRInfo, ReviewComment, ReviewResult, Severity, TokenUsage,
    WalkthroughResult,
};
use mira_diff::chunker::chunk_files;
use mira_diff::filter::DiffFilter;
use mira_diff::merger::merge_hunks;
use mira_diff::parser::parse_unified_diff;
use sha2::{Digest, Sha256};

use crate::llm::{CancelSignal, LlmClient};
use crate::noise::filter_noise;
use crate::prompt::{self, ExistingIssue};
use crate::provider::Provider;
use crate::response;
use crate::severity::classify_severity;
use crate::verify_fixes::{self, VerifyFixesOutcome};
use crate::walkthrough;

fn check_cancelled(cancel: &CancelSignal) -> Result<(), MiraError> {
    if *cancel.borrow() {
        Err(MiraError::Cancelled)
    } else {
        Ok(())
    }
}

/// Marker embedded in a posted walkthrough comment so it can be found again
/// and updated in place rather than duplicated on re-review.
pub const WALKTHROUGH_MARKER: &str = "<!-- mira-walkthrough -->";

/// Orchestrates the whole review pipeline for one configuration.
pub struct ReviewEngine {
    llm: LlmClient,
    config: MiraConfig,
    provider: Option<Box<dyn Provider>>,
}

impl ReviewEngine {
    /// Build an engine from configuration. No provider is attached yet;
    /// attach one with [`with_provider`](Self::with_provider) before calling
    /// [`review_pr`](Self::review_pr).
    pub fn new(config: MiraConfig) -> Result<Self, MiraError> {
        let llm = LlmClient::new(&config.llm)?;
        Ok(Self {
            llm,
            config,
            provider: None,
        })
    }

    pub fn with_provider(mut self, provider: Box<dyn Provider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Review raw unified-diff text with no PR context. Never calls a provider.
    pub async fn review_diff(
        &self,
        diff_text: &str,
        cancel: &CancelSignal,
    ) -> Result<ReviewResult, MiraError> {
        self.review_diff_internal(diff_text, &[], cancel).await
    }

    /// Review a pull request end to end: fetch metadata, verify prior fixes,
    /// fetch and review the diff, then (unless `dry_run`) post the results.
    ///
    /// `cancel` is checked before every provider call and LLM completion;
    /// firing it aborts the run with [`MiraError::Cancelled`].
    pub async fn review_pr(
        &self,
        pr_url: &str,
        dry_run: bool,
        cancel: &CancelSignal,
    ) -> Result<ReviewResult, MiraError> {
        let provider = self
            .provider
            .as_deref()
            .ok_or_else(|| MiraError::Config("review_pr requires a configured provider".into()))?;

        check_cancelled(cancel)?;
        let pr = provider.get_pr_info(pr_url).await?;

        let outcome: VerifyFixesOutcome = verify_fixes::verify_fixes(
            &pr,
            provider,
            &self.llm,
            &self.config.provider.bot_name,
            dry_run,
            cancel,
        )
        .await;

        let existing: Vec<ExistingIssue> = outcome
            .decisions
            .iter()
            .filter(|d| !d.fixed)
            .map(|d| ExistingIssue {
                thread_id: d.thread_id.clone(),
                path: d.path.clone(),
                line: d.line,
                title: first_line(&d.body),
            })
            .collect();

        check_cancelled(cancel)?;
        let diff_text = provider.get_pr_diff(&pr).await?;

        let mut result = self
            .review_diff_internal(&diff_text, &existing, cancel)
            .await?;
        result.thread_decisions = outcome.decisions;

        if !dry_run {
            if let Some(wt) = result.walkthrough.clone() {
                self.upsert_walkthrough(provider, &pr, &wt, &result.comments, &result.thread_decisions, cancel)
                    .await;
            }
            if !result.comments.is_empty() && check_cancelled(cancel).is_ok() {
                if let Err(e) = provider.post_review(&pr, &result).await {
                    eprintln!("warning: failed to post review for {}: {e}", pr.url);
                }
            }
        }

        eprintln!(
            "verify-fixes: resolved {} of {} unresolved thread(s)",
            outcome.resolved_count,
            result.thread_decisions.len()
        );

        Ok(result)
    }

    async fn upsert_walkthrough(
        &self,
        provider: &dyn Provider,
        pr: &PRInfo,
        wt: &WalkthroughResult,
        comments: &[ReviewComment],
        thread_decisions: &[mira_core::ThreadDecision],
        cancel: &CancelSignal,
    ) {
        if check_cancelled(cancel).is_err() {
            return;
        }
        let body = walkthrough::render(wt, comments, thread_decisions, &self.config.provider.bot_name);
        let existing = match provider.find_bot_comment(pr, WALKTHROUGH_MARKER).await {
            Ok(existing) => existing,
            Err(e) => {
                eprintln!("warning: walkthrough upsert could not look up prior comment: {e}");
                None
            }
        };

        let outcome = match existing {
            Some(comment_id) => provider.update_comment(pr, &comment_id, &body).await,
            None => provider.post_comment(pr, &body).await,
        };
        if let Err(e) = outcome {
            eprintln!("warning: failed to upsert walkthrough comment: {e}");
        }
    }

    async fn review_diff_internal(
        &self,
        diff_text: &str,
        existing: &[ExistingIssue],
        cancel: &CancelSignal,
    ) -> Result<ReviewResult, MiraError> {
        let truncated = truncate_diff(diff_text, self.config.review.max_diff_size);
        let patch = parse_unified_diff(&truncated)?;

        let diff_filter = DiffFilter::from_config(&self.config.filter);
        let filter_result = diff_filter.filter(patch.files);

        if filter_result.kept.is_empty() {
            return Ok(empty_result("no files matched the review filter"));
        }

        let mut files = filter_result.kept;

        let walkthrough = if self.config.review.walkthrough {
            self.build_walkthrough(&files, cancel).await
        } else {
            None
        };

        for file in &mut files {
            merge_hunks(file, self.config.review.context_lines);
        }

        let estimator = |text: &str| self.llm.count_tokens(text);
        let chunks = chunk_files(files, self.config.llm.max_context_tokens, Some(&estimator));
        let total_chunks = chunks.len();

        let progress = self.make_progress(total_chunks);

        let mut all_comments: Vec<ReviewComment> = Vec::new();
        let mut running_existing: Vec<ExistingIssue> = existing.to_vec();
        let mut reviewed_files = 0usize;

        for (idx, chunk) in chunks.into_iter().enumerate() {
            if check_cancelled(cancel).is_err() {
                if let Some(p) = progress {
                    p.finish_and_clear();
                }
                return Err(MiraError::Cancelled);
            }

            reviewed_files += chunk.files.len();
            let valid_paths: HashSet<PathBuf> =
                chunk.files.iter().map(|f| f.path.clone()).collect();

            let messages = prompt::build_review_messages(
                &chunk.files,
                &self.config.filter,
                &self.config.review,
                &running_existing,
            );

            let completion = match self
                .llm
                .complete(messages, true, self.config.llm.temperature, cancel)
                .await
            {
                Ok(text) => text,
                Err(MiraError::Cancelled) => {
                    if let Some(p) = progress {
                        p.finish_and_clear();
                    }
                    return Err(MiraError::Cancelled);
                }
                Err(e) => {
                    eprintln!(
                        "warning: chunk {}/{total_chunks} LLM call failed, skipping: {e}",
                        idx + 1
                    );
                    if let Some(p) = &progress {
                        p.inc(1);
                    }
                    continue;
                }
            };

            let (_summary, raw_comments) = match response::parse_review_response(&completion) {
                Ok(parsed) => parsed,
                Err(e) => {
                    eprintln!(
                        "warning: chunk {}/{total_chunks} response parse failed, skipping: {e}",
                        idx + 1
                    );
                    if let Some(p) = &progress {
                        p.inc(1);
                    }
                    continue;
                }
            };

            let comments =
                response::convert_to_review_comments(raw_comments, &valid_paths, &chunk.files);

            for c in &comments {
                running_existing.push(ExistingIssue {
                    thread_id: synthetic_thread_id(&c.path, c.line, &c.title),
                    path: c.path.clone(),
                    line: c.line,
                    title: c.title.clone(),
                });
            }
            all_comments.extend(comments);

            if let Some(p) = &progress {
                p.inc(1);
            }
        }
        if let Some(p) = progress {
            p.finish_and_clear();
        }

        let classified: Vec<ReviewComment> =
            all_comments.iter().map(classify_severity).collect();
        let final_comments = filter_noise(classified, &self.config.filter);

        let summary = if self.config.review.include_summary {
            summarize(&final_comments)
        } else {
            String::new()
        };

        Ok(ReviewResult {
            comments: final_comments,
            summary,
            reviewed_files,
            skipped_reason: None,
            token_usage: self.llm.usage(),
            walkthrough,
            thread_decisions: Vec::new(),
        })
    }

    async fn build_walkthrough(
        &self,
        files: &[FileDiff],
        cancel: &CancelSignal,
    ) -> Option<WalkthroughResult> {
        let messages = prompt::build_walkthrough_messages(files, &self.config.review);
        match self
            .llm
            .complete(messages, true, self.config.llm.temperature, cancel)
            .await
        {
            Ok(text) => match response::parse_walkthrough_response(&text, files) {
                Ok(w) => Some(w),
                Err(e) => {
                    eprintln!("warning: walkthrough response parse failed, dropping: {e}");
                    None
                }
            },
            Err(e) => {
                eprintln!("warning: walkthrough LLM call failed, dropping: {e}");
                None
            }
        }
    }

    fn make_progress(&self, total: usize) -> Option<indicatif::ProgressBar> {
        if total == 0 || !std::io::stderr().is_terminal() {
            return None;
        }
        let bar = indicatif::ProgressBar::new(total as u64);
        if let Ok(style) =
            indicatif::ProgressStyle::with_template("{spinner} reviewing chunk {pos}/{len}")
        {
            bar.set_style(style);
        }
        Some(bar)
    }
}

/// Truncate `diff` to at most `max_size` bytes, cutting at the last
/// `\ndiff --git ` boundary so no file record is left partially included.
/// Falls back to a hard cut at `max_size` if no boundary is found.
///
/// `max_size` is snapped forward to the next UTF-8 char boundary before any
/// slicing happens, so a cap landing mid-character never panics.
fn truncate_diff(diff: &str, max_size: usize) -> String {
    if diff.len() <= max_size {
        return diff.to_string();
    }
    let mut boundary = max_size;
    while boundary < diff.len() && !diff.is_char_boundary(boundary) {
        boundary += 1;
    }
    let window = &diff[..boundary];
    match window.rfind("\ndiff --git ") {
        Some(idx) => diff[..idx].to_string(),
        None => window.to_string(),
    }
}

fn empty_result(reason: &str) -> ReviewResult {
    ReviewResult {
        comments: Vec::new(),
        summary: reason.to_string(),
        reviewed_files: 0,
        skipped_reason: Some(reason.to_string()),
        token_usage: TokenUsage::default(),
        walkthrough: None,
        thread_decisions: Vec::new(),
    }
}

fn summarize(comments: &[ReviewComment]) -> String {
    if comments.is_empty() {
        return "No issues found.".to_string();
    }
    let blockers = comments.iter().filter(|c| c.severity == Severity::Blocker).count();
    let warnings = comments.iter().filter(|c| c.severity == Severity::Warning).count();
    let rest = comments.len() - blockers - warnings;
    format!(
        "Found {} issue(s): {blockers} blocker(s), {warnings} warning(s), {rest} other.",
        comments.len()
    )
}

fn first_line(body: &str) -> String {
    body.lines().next().unwrap_or_default().to_string()
}

/// Deterministic id for a suggestion never posted anywhere, so later chunks
/// in the same review pass can be told about it without a real thread id.
/// Never surfaced in `ReviewResult`, `ThreadDecision`, or any wire artifact.
pub(crate) fn synthetic_thread_id(path: &Path, line: u32, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    hasher.update(line.to_le_bytes());
    hasher.update(title.as_bytes());
    let digest = hasher.finalize();
    let prefix = digest[..8]
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    format!("chunk:{prefix:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mira_core::LlmConfig;

    #[test]
    fn truncate_diff_keeps_whole_text_when_under_limit() {
        let diff = "diff --git a/a.rs b/a.rs\n+x\n";
        assert_eq!(truncate_diff(diff, 1000), diff);
    }

    #[test]
    fn truncate_diff_cuts_at_last_file_boundary() {
        let file_a = "diff --git a/a.rs b/a.rs\n+aaaa\n";
        let file_b = "diff --git a/b.rs b/b.rs\n+bbbb\n";
        let combined = format!("{file_a}{file_b}");
        let truncated = truncate_diff(&combined, file_a.len() + 5);
        assert_eq!(truncated, file_a.trim_end_matches('\n'));
        assert!(!truncated.contains("b.rs"));
    }

    #[test]
    fn truncate_diff_hard_cuts_when_no_boundary_found() {
        let diff = "not a real diff at all, just prose".repeat(10);
        let truncated = truncate_diff(&diff, 20);
        assert_eq!(truncated.len(), 20);
    }

    #[test]
    fn synthetic_thread_id_is_deterministic() {
        let a = synthetic_thread_id(Path::new("a.rs"), 10, "Null check");
        let b = synthetic_thread_id(Path::new("a.rs"), 10, "Null check");
        assert_eq!(a, b);
        assert!(a.starts_with("chunk:"));
    }

    #[test]
    fn synthetic_thread_id_differs_for_different_inputs() {
        let a = synthetic_thread_id(Path::new("a.rs"), 10, "Null check");
        let b = synthetic_thread_id(Path::new("a.rs"), 11, "Null check");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_result_has_skip_reason_and_zero_files() {
        let result = empty_result("nothing matched");
        assert_eq!(result.reviewed_files, 0);
        assert_eq!(result.skipped_reason.as_deref(), Some("nothing matched"));
    }

    #[test]
    fn summarize_reports_no_issues_when_empty() {
        assert_eq!(summarize(&[]), "No issues found.");
    }

    #[tokio::test]
    async fn review_diff_on_empty_input_returns_explanatory_result() {
        let engine = ReviewEngine::new(MiraConfig::default()).unwrap();
        let (_tx, rx) = tokio::sync::watch::channel(false);
        let result = engine.review_diff("", &rx).await.unwrap();
        assert_eq!(result.reviewed_files, 0);
        assert!(result.skipped_reason.is_some());
    }

    #[tokio::test]
    async fn review_pr_without_provider_errors() {
        let engine = ReviewEngine::new(MiraConfig::default()).unwrap();
        let (_tx, rx) = tokio::sync::watch::channel(false);
        let result = engine.review_pr("https://example.com/pr/1", true, &rx).await;
        assert!(result.is_err());
    }

    #[test]
    fn new_engine_builds_llm_from_config() {
        let config = MiraConfig {
            llm: LlmConfig {
                model: Some("gpt-4o-mini".into()),
                ..LlmConfig::default()
            },
            ..MiraConfig::default()
        };
        assert!(ReviewEngine::new(config).is_ok());
    }

    #[tokio::test]
    async fn review_diff_internal_chunk_loop_respects_cancellation() {
        let config = MiraConfig {
            llm: LlmConfig {
                model: Some("gpt-4o-mini".into()),
                ..LlmConfig::default()
            },
            review: mira_core::ReviewConfig {
                walkthrough: false,
                ..mira_core::ReviewConfig::default()
            },
            ..MiraConfig::default()
        };
        let engine = ReviewEngine::new(config).unwrap();
        let diff = "diff --git a/a.rs b/a.rs\n--- a/a.rs\n+++ b/a.rs\n@@ -1,1 +1,1 @@\n-old\n+new\n";
        let (tx, rx) = tokio::sync::watch::channel(false);
        tx.send(true).unwrap();
        let result = engine.review_diff_internal(diff, &[], &rx).await;
        assert!(matches!(result, Err(MiraError::Cancelled)));
    }
}
