//! Decides which previously posted review threads are fixed by later commits.
//!
//! Any failure along this path — fetching threads, fetching file content, the
//! LLM call itself, parsing its response — is logged and swallowed; the main
//! review continues with an empty "fixed" set rather than failing the run.

use std::collections::HashMap;

use mira_core::{MiraError, PRInfo, ThreadDecision, UnresolvedThread};

use crate::llm::{CancelSignal, LlmClient};
use crate::prompt::{self, FileThreadGroup, ThreadSummary};
use crate::provider::Provider;
use crate::response;

fn check_cancelled(cancel: &CancelSignal) -> Result<(), MiraError> {
    if *cancel.borrow() {
        Err(MiraError::Cancelled)
    } else {
        Ok(())
    }
}

const MAX_FULL_FILE_LINES: usize = 500;
const LARGE_FILE_CONTEXT_LINES: usize = 50;

/// Outcome of a verify-fixes pass.
#[derive(Debug, Clone, Default)]
pub struct VerifyFixesOutcome {
    pub decisions: Vec<ThreadDecision>,
    pub resolved_count: usize,
}

/// Run the verify-fixes state machine for one PR: fetch unresolved bot
/// threads, ask the model which are fixed given current file contents, then
/// (unless `dry_run`) resolve the confirmed ones through the provider.
pub async fn verify_fixes(
    pr: &PRInfo,
    provider: &dyn Provider,
    llm: &LlmClient,
    bot_name: &str,
    dry_run: bool,
    cancel: &CancelSignal,
) -> VerifyFixesOutcome {
    if check_cancelled(cancel).is_err() {
        return VerifyFixesOutcome::default();
    }

    let threads = match provider
        .get_unresolved_bot_threads(pr, Some(bot_name))
        .await
    {
        Ok(threads) => threads,
        Err(e) => {
            eprintln!("warning: verify-fixes could not fetch unresolved threads: {e}");
            return VerifyFixesOutcome::default();
        }
    };

    if threads.is_empty() {
        return VerifyFixesOutcome::default();
    }

    let groups = match build_groups(pr, provider, &threads, cancel).await {
        Ok(groups) => groups,
        Err(e) => {
            eprintln!("warning: verify-fixes could not build file groups: {e}");
            return VerifyFixesOutcome::default();
        }
    };

    if check_cancelled(cancel).is_err() {
        return VerifyFixesOutcome::default();
    }

    let messages = prompt::build_verify_fixes_messages(&groups);
    let completion = match llm.complete(messages, true, 0.0, cancel).await {
        Ok(text) => text,
        Err(e) => {
            eprintln!("warning: verify-fixes LLM call failed: {e}");
            return VerifyFixesOutcome::default();
        }
    };

    let fixed_ids: HashMap<String, bool> = match response::parse_verify_fixes_response(&completion)
    {
        Ok(decisions) => decisions.into_iter().map(|d| (d.thread_id, d.fixed)).collect(),
        Err(e) => {
            eprintln!("warning: verify-fixes could not parse LLM response: {e}");
            return VerifyFixesOutcome::default();
        }
    };

    let decisions: Vec<ThreadDecision> = threads
        .iter()
        .map(|t| ThreadDecision {
            thread_id: t.thread_id.clone(),
            path: t.path.clone(),
            line: t.line,
            body: t.body.clone(),
            fixed: fixed_ids.get(&t.thread_id).copied().unwrap_or(false),
        })
        .collect();

    let fixed_thread_ids: Vec<String> = decisions
        .iter()
        .filter(|d| d.fixed)
        .map(|d| d.thread_id.clone())
        .collect();

    if fixed_thread_ids.is_empty() {
        return VerifyFixesOutcome {
            decisions,
            resolved_count: 0,
        };
    }

    if dry_run {
        eprintln!(
            "dry-run: would resolve {} thread(s): {:?}",
            fixed_thread_ids.len(),
            fixed_thread_ids
        );
        return VerifyFixesOutcome {
            decisions,
            resolved_count: 0,
        };
    }

    if check_cancelled(cancel).is_err() {
        return VerifyFixesOutcome {
            decisions,
            resolved_count: 0,
        };
    }

    let resolved_count = match provider.resolve_threads(pr, &fixed_thread_ids).await {
        Ok(count) => count,
        Err(e) => {
            eprintln!("warning: verify-fixes could not resolve threads: {e}");
            0
        }
    };

    VerifyFixesOutcome {
        decisions,
        resolved_count,
    }
}

async fn build_groups(
    pr: &PRInfo,
    provider: &dyn Provider,
    threads: &[UnresolvedThread],
    cancel: &CancelSignal,
) -> Result<Vec<FileThreadGroup>, MiraError> {
    let mut by_path: HashMap<std::path::PathBuf, Vec<&UnresolvedThread>> = HashMap::new();
    for thread in threads {
        by_path.entry(thread.path.clone()).or_default().push(thread);
    }

    let mut groups = Vec::with_capacity(by_path.len());
    for (path, path_threads) in by_path {
        check_cancelled(cancel)?;
        let content = provider
            .get_file_content(pr, &path.to_string_lossy(), &pr.head_branch)
            .await?;

        let numbered_content = render_group_content(&content, &path_threads);
        let threads = path_threads
            .iter()
            .map(|t| ThreadSummary {
                thread_id: t.thread_id.clone(),
                line: t.line,
                body: prompt::clean_thread_body(&t.body),
                is_outdated: t.is_outdated,
            })
            .collect();

        groups.push(FileThreadGroup {
            path,
            numbered_content,
            threads,
        });
    }
    Ok(groups)
}

fn render_group_content(content: &str, threads: &[&UnresolvedThread]) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() <= MAX_FULL_FILE_LINES {
        return render_numbered(&lines, 1, lines.len());
    }

    let all_known = threads.iter().all(|t| t.line > 0);
    if !all_known {
        return render_numbered(&lines, 1, lines.len());
    }

    let mut ranges: Vec<(usize, usize)> = threads
        .iter()
        .map(|t| {
            let line = t.line as usize;
            let start = line.saturating_sub(LARGE_FILE_CONTEXT_LINES).max(1);
            let end = (line + LARGE_FILE_CONTEXT_LINES).min(lines.len());
            (start, end)
        })
        .collect();
    ranges.sort_unstable();

    let mut merged: Vec<(usize, usize)> = Vec::new();
    for (start, end) in ranges {
        match merged.last_mut() {
            Some((_, last_end)) if start <= *last_end + 1 => {
                *last_end = (*last_end).max(end);
            }
            _ => merged.push((start, end)),
        }
    }

    merged
        .iter()
        .map(|(start, end)| render_numbered(&lines, *start, *end))
        .collect::<Vec<_>>()
        .join("\n...\n")
}

fn render_numbered(lines: &[&str], start: usize, end: usize) -> String {
    let width = end.to_string().len();
    lines[start - 1..end]
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:>width$} {line}", start + i, width = width))
        .collect::<Vec<_>>()
        .join("\n")
}
