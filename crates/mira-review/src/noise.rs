//! Final confidence/severity filtering and duplicate suppression before a
//! review is handed back to the caller.

use std::collections::HashSet;

use mira_core::{FilterConfig, ReviewComment};

/// Apply the noise-filtering policy: confidence/severity thresholds, sort,
/// composite-similarity dedup, then cap at `max_comments`.
pub fn filter_noise(comments: Vec<ReviewComment>, config: &FilterConfig) -> Vec<ReviewComment> {
    let mut filtered: Vec<ReviewComment> = comments
        .into_iter()
        .filter(|c| c.confidence >= config.confidence_threshold)
        .filter(|c| c.severity >= config.min_severity)
        .collect();

    filtered.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then(b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal))
    });

    let deduped = deduplicate(filtered);
    deduped.into_iter().take(config.max_comments).collect()
}

fn deduplicate(sorted: Vec<ReviewComment>) -> Vec<ReviewComment> {
    let mut kept: Vec<ReviewComment> = Vec::new();
    for candidate in sorted {
        let is_duplicate = kept.iter().any(|k| is_duplicate_of(&candidate, k));
        if !is_duplicate {
            kept.push(candidate);
        }
    }
    kept
}

fn is_duplicate_of(c: &ReviewComment, k: &ReviewComment) -> bool {
    if c.path != k.path {
        return false;
    }

    let same_span = c.line == k.line && c.end_line == k.end_line;
    if same_span {
        return true;
    }

    let overlap = lines_overlap(c, k);
    let sim = jaccard(&word_set(&c.title), &word_set(&k.title));

    (overlap && sim >= 0.2) || sim >= 0.6
}

fn lines_overlap(a: &ReviewComment, b: &ReviewComment) -> bool {
    let (a_start, a_end) = (a.line, a.end_line.unwrap_or(a.line));
    let (b_start, b_end) = (b.line, b.end_line.unwrap_or(b.line));
    a_start <= b_end && b_start <= a_end
}

fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}
