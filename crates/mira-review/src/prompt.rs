//! Builds the four prompt families the engine sends to the LLM: review,
//! walkthrough, verify-fixes, and free-form conversation.
//!
//! Prompt bodies are assembled with plain `format!`/`String` functions, one
//! per family, rather than pulling in a templating engine — there's nothing
//! here a templating dependency would buy beyond what `mira-core`/`mira-diff`
//! already provide.

use std::path::PathBuf;

use mira_core::{FileDiff, FilterConfig, PRInfo, ReviewConfig};
use regex::Regex;

use crate::llm::{ChatMessage, Role};

/// A previously raised issue the model should not re-suggest.
///
/// `thread_id` is the provider's thread id for an already-posted comment, or
/// a synthetic id (see `engine::synthetic_thread_id`) for a suggestion made
/// earlier in the same chunked review pass. It isn't rendered into the
/// prompt — only `path`/`line`/`title` are — but travels with the issue so
/// later dedup against real threads stays possible.
#[derive(Debug, Clone)]
pub struct ExistingIssue {
    pub thread_id: String,
    pub path: PathBuf,
    pub line: u32,
    pub title: String,
}

/// Build the review system + user messages for one chunk of files.
pub fn build_review_messages(
    files: &[FileDiff],
    filter: &FilterConfig,
    review: &ReviewConfig,
    existing: &[ExistingIssue],
) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: Role::System,
            content: build_review_system_prompt(filter, review, existing),
        },
        ChatMessage {
            role: Role::User,
            content: build_review_user_prompt(files),
        },
    ]
}

fn build_review_system_prompt(
    filter: &FilterConfig,
    review: &ReviewConfig,
    existing: &[ExistingIssue],
) -> String {
    let style_note = if review.focus_only_on_problems {
        "Do NOT comment on style, formatting, naming, or missing documentation — focus exclusively on correctness and security."
    } else {
        "Style and readability notes are welcome but should be tagged with low severity."
    };

    let mut prompt = format!(
        "You are Mira, an expert code reviewer. Review the diff below and report genuine defects.\n\
         \n\
         RULES:\n\
         1. Only report issues you are confident about; set `confidence` honestly in [0, 1].\n\
         2. Reference EXACT line numbers from the diff. Every comment MUST have a valid line number.\n\
         3. Do not speculate about behavior you cannot verify from the diff alone.\n\
         4. {style_note}\n\
         5. Confidence below {threshold} will be discarded, so don't pad low-confidence noise.\n\
         6. At most {max_comments} comments will be kept; prioritize the most severe findings.\n\
         \n\
         SEVERITY DEFINITIONS:\n\
         - blocker: must be fixed before merge (exploitable security issue, guaranteed defect)\n\
         - warning: likely defect under realistic conditions\n\
         - suggestion: optional improvement, not a defect\n\
         - nitpick: cosmetic or stylistic\n\
         \n\
         Respond with a JSON object, no markdown fences, no prose outside JSON:\n\
         {{\n\
           \"comments\": [\n\
             {{\n\
               \"path\": \"exact/path/from/diff.rs\",\n\
               \"line\": 42,\n\
               \"end_line\": null,\n\
               \"severity\": \"warning\",\n\
               \"category\": \"correctness\",\n\
               \"title\": \"Short summary\",\n\
               \"body\": \"Concrete explanation with a scenario\",\n\
               \"confidence\": 0.9,\n\
               \"suggestion\": null,\n\
               \"existing_code\": null\n\
             }}\n\
           ],\n\
           \"summary\": \"\",\n\
           \"metadata\": {{ \"reviewed_files\": 0 }}\n\
         }}\n\
         \n\
         If you find no issues, return: {{\"comments\": [], \"summary\": \"\", \"metadata\": {{\"reviewed_files\": 0}}}}",
        style_note = style_note,
        threshold = filter.confidence_threshold,
        max_comments = filter.max_comments,
    );

    if !existing.is_empty() {
        prompt.push_str("\n\nThe following issues were already raised; do not repeat them:\n");
        for issue in existing {
            prompt.push_str(&format!(
                "- {}:{} — {}\n",
                issue.path.display(),
                issue.line,
                issue.title
            ));
        }
    }

    prompt
}

fn build_review_user_prompt(files: &[FileDiff]) -> String {
    let mut prompt = String::from("Review the following code changes:\n\n```diff\n");
    for file in files {
        prompt.push_str(&format!("--- {}\n", file.path.display()));
        for hunk in &file.hunks {
            prompt.push_str(&hunk.content);
            if !hunk.content.ends_with('\n') {
                prompt.push('\n');
            }
        }
    }
    prompt.push_str("```\n");
    if files.len() > 1 {
        prompt.push_str(
            "\nThese files are part of the same change and may be related. Look for \
             cross-file issues: signature changes not reflected in callers, inconsistent \
             error handling, API contract violations between modules.\n",
        );
    }
    prompt
}

/// Build the walkthrough system + user messages.
///
/// Only per-file metadata is sent — path, change type, language, line
/// counts, and hunk headers — never full hunk bodies, keeping the
/// walkthrough call cheap relative to the per-chunk review calls.
pub fn build_walkthrough_messages(files: &[FileDiff], review: &ReviewConfig) -> Vec<ChatMessage> {
    let diagram_note = if review.walkthrough_sequence_diagram {
        "If the change involves a clear multi-step interaction, include a Mermaid sequence \
         diagram depicting actual code components (functions, modules, services) — never \
         abstract actors like \"User\" or \"System\". Omit the diagram entirely when it \
         wouldn't add clarity."
    } else {
        "Do not include a sequence diagram."
    };

    let system = format!(
        "You are summarizing a pull request for reviewers. Produce a concise summary, an \
         effort estimate, and a one-line description per changed file. {diagram_note}\n\n\
         Respond with JSON: {{\"summary\":\"\",\"effort\":{{\"level\":\"low|medium|high\",\
         \"label\":\"\",\"minutes\":0}},\"file_changes\":[{{\"path\":\"\",\"description\":\"\",\
         \"group\":null}}],\"sequence_diagram\":null}}"
    );

    let mut user = String::from("Files changed:\n\n");
    let hunk_header_re = hunk_header_regex();
    for file in files {
        user.push_str(&format!(
            "- {} ({}, {}, +{}/-{})\n",
            file.path.display(),
            file.change_type,
            if file.language.is_empty() {
                "unknown"
            } else {
                &file.language
            },
            file.added_lines,
            file.deleted_lines,
        ));
        for hunk in &file.hunks {
            if let Some(m) = hunk_header_re.find(&hunk.content) {
                user.push_str(&format!("  {}\n", m.as_str()));
            }
        }
    }

    vec![
        ChatMessage {
            role: Role::System,
            content: system,
        },
        ChatMessage {
            role: Role::User,
            content: user,
        },
    ]
}

fn hunk_header_regex() -> Regex {
    Regex::new(r"@@ -\d+(?:,\d+)? \+\d+(?:,\d+)? @@.*").expect("static hunk header pattern")
}

/// One thread attached to a file, summarized for the verify-fixes prompt.
#[derive(Debug, Clone)]
pub struct ThreadSummary {
    pub thread_id: String,
    pub line: u32,
    pub body: String,
    pub is_outdated: bool,
}

/// A file's current numbered content plus the threads anchored to it.
#[derive(Debug, Clone)]
pub struct FileThreadGroup {
    pub path: PathBuf,
    pub numbered_content: String,
    pub threads: Vec<ThreadSummary>,
}

/// Build the verify-fixes system + user messages.
pub fn build_verify_fixes_messages(groups: &[FileThreadGroup]) -> Vec<ChatMessage> {
    let system = "You verify whether previously reported code review issues have been fixed \
         by later commits. For each thread, decide `fixed: true` when the problematic pattern \
         was removed or replaced, the description no longer matches the current code, or the \
         concern no longer applies given the surrounding changes. Threads marked [OUTDATED] are \
         highly likely fixed. Respond with strict JSON and nothing else: \
         {\"results\":[{\"id\":\"<thread_id>\",\"fixed\":true|false}]}"
        .to_string();

    let mut user = String::new();
    for group in groups {
        user.push_str(&format!("## {}\n\n", group.path.display()));
        user.push_str(&group.numbered_content);
        user.push_str("\n\nIssues reported on this file:\n");
        for thread in &group.threads {
            let outdated = if thread.is_outdated { " [OUTDATED]" } else { "" };
            user.push_str(&format!(
                "- id={} line={}{}: {}\n",
                thread.thread_id, thread.line, outdated, thread.body
            ));
        }
        user.push('\n');
    }

    vec![
        ChatMessage {
            role: Role::System,
            content: system,
        },
        ChatMessage {
            role: Role::User,
            content: user,
        },
    ]
}

/// Build a free-form conversational reply about a PR. Not JSON-mode.
pub fn build_conversation_messages(
    pr: &PRInfo,
    history: &[ChatMessage],
    user_message: &str,
) -> Vec<ChatMessage> {
    let system = format!(
        "You are Mira, replying conversationally on pull request #{} ({}/{}): \"{}\". \
         Be concise and specific to the code under discussion.",
        pr.number, pr.owner, pr.repo, pr.title
    );

    let mut messages = vec![ChatMessage {
        role: Role::System,
        content: system,
    }];
    messages.extend(history.iter().cloned());
    messages.push(ChatMessage {
        role: Role::User,
        content: user_message.to_string(),
    });
    messages
}

const BADGE_LINE_MAX_LEN: usize = 80;
const CLEANED_BODY_MAX_LEN: usize = 300;
const TRUNCATION_MARKERS: &[&str] = &["**Suggested fix:**", "```suggestion", "<details>"];

/// Clean a posted thread body before it's re-included in a prompt:
/// truncate at known boilerplate markers, strip bold emphasis, drop a short
/// badge-line first paragraph, and cap the result at 300 characters on a
/// word boundary.
pub fn clean_thread_body(body: &str) -> String {
    let mut text = body;
    for marker in TRUNCATION_MARKERS {
        if let Some(idx) = text.find(marker) {
            text = &text[..idx];
        }
    }

    let mut text = text.replace("**", "");

    if let Some((first, rest)) = text.split_once("\n\n") {
        if first.trim().len() < BADGE_LINE_MAX_LEN {
            text = rest.to_string();
        }
    }

    let text = text.trim().to_string();
    if text.len() <= CLEANED_BODY_MAX_LEN {
        return text;
    }

    let mut boundary = CLEANED_BODY_MAX_LEN;
    while boundary < text.len() && !text.is_char_boundary(boundary) {
        boundary += 1;
    }
    let truncated = &text[..boundary];
    let cut = truncated.rfind(' ').unwrap_or(boundary);
    format!("{}…", &truncated[..cut].trim_end())
}
