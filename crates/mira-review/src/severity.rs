//! Keyword-driven severity adjustment applied after response parsing.
//!
//! LLMs reliably over-rate exploitable findings as merely "suggestions" and
//! under-rate non-exploitable security smells as BLOCKER; this pass corrects
//! both directions from the comment's own text rather than trusting the
//! model's self-reported severity outright.

use mira_core::{ReviewComment, Severity};
use regex::Regex;
use std::sync::OnceLock;

const EXPLOITABLE_KEYWORDS: &[&str] = &[
    "sql injection",
    "xss",
    "command injection",
    "path traversal",
    "remote code execution",
    "arbitrary code",
    "eval(",
    "exec(",
    "deserialization",
    "buffer overflow",
];

const SECURITY_SMELL_KEYWORDS: &[&str] = &[
    "hardcoded",
    "default key",
    "default password",
    "default secret",
    "insecure default",
    "missing validation",
    "insecure",
    "vulnerability",
];

const STYLE_KEYWORDS: &[&str] = &[
    "naming convention",
    "formatting",
    "whitespace",
    "indentation",
    "import order",
];

const BUG_KEYWORDS: &[&str] = &["bug", "error", "crash", "security", "vulnerability"];

fn exploitable_pattern_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\brce\b|\bcsrf\b|\bssrf\b").expect("static pattern"))
}

/// Classify (and if needed, adjust) one comment's severity from its own text.
///
/// Rules apply in order, first match wins:
/// 1. Exploitable keywords/patterns → ensure severity is at least `Blocker`.
/// 2. `category == "security"` or a security-smell keyword → cap at `Warning`
///    (both upgrading a too-low severity and downgrading an over-eager `Blocker`).
/// 3. `category == "style"`, or style keywords without a bug keyword present
///    → cap at `Nitpick`.
/// 4. Otherwise the model's own severity stands.
pub fn classify_severity(comment: &ReviewComment) -> ReviewComment {
    let text = format!("{} {}", comment.title, comment.body).to_lowercase();

    if EXPLOITABLE_KEYWORDS.iter().any(|kw| text.contains(kw))
        || exploitable_pattern_regex().is_match(&text)
    {
        return if comment.severity < Severity::Blocker {
            comment.with_severity(Severity::Blocker)
        } else {
            comment.clone()
        };
    }

    if comment.category == "security" || SECURITY_SMELL_KEYWORDS.iter().any(|kw| text.contains(kw))
    {
        return if comment.severity != Severity::Warning {
            comment.with_severity(Severity::Warning)
        } else {
            comment.clone()
        };
    }

    let hits_style = STYLE_KEYWORDS.iter().any(|kw| text.contains(kw));
    let hits_bug = BUG_KEYWORDS.iter().any(|kw| text.contains(kw));
    if comment.category == "style" || (hits_style && !hits_bug) {
        return if comment.severity != Severity::Nitpick {
            comment.with_severity(Severity::Nitpick)
        } else {
            comment.clone()
        };
    }

    comment.clone()
}
