//! Parses raw LLM completions into typed results and guards against
//! hallucinated comments before they ever reach a user.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use mira_core::{
    ChangeType, FileDiff, ReviewComment, Severity, WalkthroughEffort, WalkthroughFileEntry,
    WalkthroughResult,
};
use serde::Deserialize;
use thiserror::Error;

const MAX_TITLE_LEN: usize = 80;

#[derive(Debug, Error)]
pub enum ResponseParseError {
    #[error("response was not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("response JSON was not an object")]
    NotAnObject,
    #[error("no JSON object found in response")]
    NoJsonFound,
}

#[derive(Debug, Deserialize)]
struct LlmReviewResponse {
    #[serde(default)]
    comments: Vec<LlmComment>,
    #[serde(default)]
    summary: String,
}

#[derive(Debug, Deserialize)]
struct LlmComment {
    path: String,
    line: i64,
    #[serde(default)]
    end_line: Option<i64>,
    severity: String,
    #[serde(default)]
    category: String,
    title: String,
    body: String,
    #[serde(default)]
    confidence: f64,
    #[serde(default)]
    suggestion: Option<String>,
    #[serde(default)]
    existing_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LlmWalkthroughResponse {
    summary: String,
    #[serde(default)]
    effort: Option<LlmEffort>,
    #[serde(default)]
    file_changes: Vec<LlmFileChange>,
    #[serde(default)]
    sequence_diagram: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LlmEffort {
    level: String,
    label: String,
    minutes: u32,
}

#[derive(Debug, Deserialize)]
struct LlmFileChange {
    path: String,
    description: String,
    #[serde(default)]
    group: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LlmVerifyFixesResponse {
    results: Vec<LlmFixDecision>,
}

#[derive(Debug, Deserialize)]
struct LlmFixDecision {
    id: String,
    fixed: bool,
}

/// Result of a verify-fixes pass for a single thread.
#[derive(Debug, Clone, PartialEq)]
pub struct FixDecision {
    pub thread_id: String,
    pub fixed: bool,
}

/// A review comment as received from the LLM, before the anti-hallucination
/// filter in [`convert_to_review_comments`] runs. `existing_code` only lives
/// here — it's consumed for validation and never carried into the final
/// [`ReviewComment`].
#[derive(Debug, Clone)]
pub struct RawReviewComment {
    pub path: String,
    pub line: i64,
    pub end_line: Option<i64>,
    pub severity: String,
    pub category: String,
    pub title: String,
    pub body: String,
    pub confidence: f64,
    pub suggestion: Option<String>,
    pub existing_code: Option<String>,
}

/// Strip a single leading/trailing markdown code fence, if present.
/// Tolerates a language tag (` ```json `) on the opening fence.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Extract the first balanced `{...}` JSON object found anywhere in `text`,
/// tolerating surrounding prose the model may have added despite instructions.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_json_object(text: &str) -> Result<serde_json::Value, ResponseParseError> {
    let stripped = strip_code_fences(text);
    let candidate = if stripped.starts_with('{') {
        stripped
    } else {
        extract_json_object(stripped).ok_or(ResponseParseError::NoJsonFound)?
    };
    let value: serde_json::Value = serde_json::from_str(candidate)?;
    if !value.is_object() {
        return Err(ResponseParseError::NotAnObject);
    }
    Ok(value)
}

/// Parse a raw review completion into its summary text and raw comments,
/// ready for [`convert_to_review_comments`] to anti-hallucination-filter.
pub fn parse_review_response(
    text: &str,
) -> Result<(String, Vec<RawReviewComment>), ResponseParseError> {
    let value = parse_json_object(text)?;
    let parsed: LlmReviewResponse = serde_json::from_value(value)?;
    let comments = parsed
        .comments
        .into_iter()
        .map(|c| RawReviewComment {
            path: c.path,
            line: c.line,
            end_line: c.end_line,
            severity: c.severity,
            category: c.category,
            title: c.title,
            body: c.body,
            confidence: c.confidence,
            suggestion: c.suggestion,
            existing_code: c.existing_code,
        })
        .collect();
    Ok((parsed.summary, comments))
}

/// Apply the anti-hallucination filter to raw LLM comments: drop anything
/// that references a file or line the diff doesn't actually contain, or
/// whose claimed existing code can't be found in that file's hunks.
pub fn convert_to_review_comments(
    comments: Vec<RawReviewComment>,
    valid_paths: &HashSet<PathBuf>,
    diff_files: &[FileDiff],
) -> Vec<ReviewComment> {
    comments
        .into_iter()
        .filter(|c| valid_paths.contains(&PathBuf::from(&c.path)))
        .filter(|c| c.line >= 1)
        .filter(|c| !(c.suggestion.is_some() && c.body.trim().is_empty()))
        .filter(|c| match &c.existing_code {
            Some(existing_code) => {
                hunk_contains(diff_files, Path::new(&c.path), existing_code.trim())
            }
            None => true,
        })
        .map(|c| {
            let mut suggestion = c.suggestion;
            if suggestion.as_deref().map(str::trim) == c.existing_code.as_deref().map(str::trim) {
                suggestion = None;
            }
            let mut title = c.title;
            if let Some((i, _)) = title.char_indices().nth(MAX_TITLE_LEN) {
                title.truncate(i);
            }
            let line = c.line.max(0) as u32;
            let end_line = c.end_line.and_then(|e| {
                let e = e.max(0) as u32;
                (e > line).then_some(e)
            });
            let severity: Severity = c.severity.parse().unwrap_or(Severity::Suggestion);
            ReviewComment {
                path: PathBuf::from(c.path),
                line,
                end_line,
                severity,
                category: c.category,
                title,
                body: c.body,
                confidence: c.confidence.clamp(0.0, 1.0),
                suggestion,
                agent_prompt: None,
            }
        })
        .collect()
}

fn hunk_contains(diff_files: &[FileDiff], path: &Path, snippet: &str) -> bool {
    diff_files
        .iter()
        .filter(|f| f.path == path)
        .any(|f| f.hunks.iter().any(|h| h.content.contains(snippet)))
}

/// Parse a raw walkthrough completion into a [`WalkthroughResult`].
///
/// `files` supplies each path's real [`ChangeType`], since the model is
/// never asked to report it — only a one-line description and optional group.
pub fn parse_walkthrough_response(
    text: &str,
    files: &[FileDiff],
) -> Result<WalkthroughResult, ResponseParseError> {
    let value = parse_json_object(text)?;
    let parsed: LlmWalkthroughResponse = serde_json::from_value(value)?;

    let effort = parsed.effort.map(|e| WalkthroughEffort {
        level: e.level,
        label: e.label,
        minutes: e.minutes,
    });

    let file_changes = parsed
        .file_changes
        .into_iter()
        .map(|fc| {
            let path = PathBuf::from(fc.path);
            let change_type = files
                .iter()
                .find(|f| f.path == path)
                .map(|f| f.change_type)
                .unwrap_or(ChangeType::Modified);
            WalkthroughFileEntry {
                path,
                change_type,
                description: fc.description,
                group: fc.group,
            }
        })
        .collect();

    Ok(WalkthroughResult {
        summary: parsed.summary,
        file_changes,
        effort,
        sequence_diagram: parsed.sequence_diagram,
    })
}

/// Parse a raw verify-fixes completion into per-thread fix decisions.
/// Tolerates prose surrounding the JSON payload.
pub fn parse_verify_fixes_response(
    text: &str,
) -> Result<Vec<FixDecision>, ResponseParseError> {
    let value = parse_json_object(text)?;
    let parsed: LlmVerifyFixesResponse = serde_json::from_value(value)?;
    Ok(parsed
        .results
        .into_iter()
        .map(|r| FixDecision {
            thread_id: r.id,
            fixed: r.fixed,
        })
        .collect())
}
