//! Assembles a [`WalkthroughResult`] plus the chunk review's final comments
//! and thread decisions into a single Markdown comment body.

use std::collections::BTreeMap;

use mira_core::{ReviewComment, Severity, ThreadDecision, WalkthroughResult};

use crate::engine::WALKTHROUGH_MARKER;

/// Render the full walkthrough comment body.
///
/// Section order: hidden marker, heading, summary, optional effort line,
/// optional Changes block, optional Review Status table, optional sequence
/// diagram, a separator, then a help footer naming `bot_name`.
pub fn render(
    wt: &WalkthroughResult,
    comments: &[ReviewComment],
    thread_decisions: &[ThreadDecision],
    bot_name: &str,
) -> String {
    let mut out = String::new();
    out.push_str(WALKTHROUGH_MARKER);
    out.push_str("\n## Mira PR Walkthrough\n\n");
    out.push_str(wt.summary.trim());
    out.push('\n');

    if let Some(effort) = &wt.effort {
        out.push_str(&format!(
            "\n**Estimated effort:** {} ({} min)\n",
            effort.label, effort.minutes
        ));
    }

    if !wt.file_changes.is_empty() {
        out.push_str("\n### Changes\n\n");
        out.push_str(&render_changes(wt));
    }

    if let Some(status) = render_review_status(comments, thread_decisions) {
        out.push_str("\n### Review Status\n\n");
        out.push_str(&status);
    }

    if let Some(diagram) = &wt.sequence_diagram {
        out.push_str("\n### Sequence Diagram\n\n```mermaid\n");
        out.push_str(diagram.trim());
        out.push_str("\n```\n");
    }

    out.push_str("\n---\n");
    out.push_str(&format!(
        "_Generated by **{bot_name}**. Reply to a comment to start a conversation with it._\n"
    ));
    out
}

fn render_changes(wt: &WalkthroughResult) -> String {
    let any_grouped = wt.file_changes.iter().any(|f| f.group.is_some());
    if !any_grouped {
        return render_table(wt.file_changes.iter().collect());
    }

    let mut groups: BTreeMap<String, Vec<&mira_core::WalkthroughFileEntry>> = BTreeMap::new();
    for entry in &wt.file_changes {
        let key = entry.group.clone().unwrap_or_else(|| "Other".to_string());
        groups.entry(key).or_default().push(entry);
    }

    let mut out = String::new();
    for (group, entries) in groups {
        out.push_str(&format!("**{group}**\n\n"));
        out.push_str(&render_table(entries));
        out.push('\n');
    }
    out
}

fn render_table(entries: Vec<&mira_core::WalkthroughFileEntry>) -> String {
    let mut out = String::new();
    out.push_str("| File | Change | Description |\n");
    out.push_str("| --- | --- | --- |\n");
    for entry in entries {
        out.push_str(&format!(
            "| `{}` | {} | {} |\n",
            entry.path.display(),
            entry.change_type,
            entry.description
        ));
    }
    out
}

fn render_review_status(
    comments: &[ReviewComment],
    thread_decisions: &[ThreadDecision],
) -> Option<String> {
    let existing_count = thread_decisions.iter().filter(|d| !d.fixed).count();
    if comments.is_empty() && existing_count == 0 {
        return None;
    }

    let mut counts: BTreeMap<Severity, usize> = BTreeMap::new();
    for c in comments {
        *counts.entry(c.severity).or_insert(0) += 1;
    }

    let mut rows: Vec<(Severity, usize)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.0.cmp(&a.0));

    let mut out = String::new();
    out.push_str("| Severity | Count |\n");
    out.push_str("| --- | --- |\n");
    for (severity, count) in &rows {
        out.push_str(&format!("| {severity} | {count} |\n"));
    }
    if existing_count > 0 {
        let noun = if existing_count == 1 { "issue" } else { "issues" };
        out.push_str(&format!("| Existing | {existing_count} unresolved {noun} |\n"));
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mira_core::{ChangeType, WalkthroughEffort, WalkthroughFileEntry};
    use std::path::PathBuf;

    fn base_walkthrough() -> WalkthroughResult {
        WalkthroughResult {
            summary: "Adds retry support to the HTTP client.".into(),
            file_changes: vec![WalkthroughFileEntry {
                path: PathBuf::from("src/client.rs"),
                change_type: ChangeType::Modified,
                description: "Adds exponential backoff".into(),
                group: None,
            }],
            effort: None,
            sequence_diagram: None,
        }
    }

    fn comment(severity: Severity) -> ReviewComment {
        ReviewComment {
            path: PathBuf::from("src/client.rs"),
            line: 1,
            end_line: None,
            severity,
            category: "correctness".into(),
            title: "t".into(),
            body: "b".into(),
            confidence: 0.9,
            suggestion: None,
            agent_prompt: None,
        }
    }

    #[test]
    fn renders_marker_heading_and_summary() {
        let body = render(&base_walkthrough(), &[], &[], "mira");
        assert!(body.starts_with(WALKTHROUGH_MARKER));
        assert!(body.contains("## Mira PR Walkthrough"));
        assert!(body.contains("Adds retry support"));
    }

    #[test]
    fn omits_effort_line_when_absent() {
        let body = render(&base_walkthrough(), &[], &[], "mira");
        assert!(!body.contains("Estimated effort"));
    }

    #[test]
    fn includes_effort_line_when_present() {
        let mut wt = base_walkthrough();
        wt.effort = Some(WalkthroughEffort {
            level: "medium".into(),
            label: "Medium".into(),
            minutes: 15,
        });
        let body = render(&wt, &[], &[], "mira");
        assert!(body.contains("**Estimated effort:** Medium (15 min)"));
    }

    #[test]
    fn flat_table_when_no_entry_has_a_group() {
        let body = render(&base_walkthrough(), &[], &[], "mira");
        assert!(body.contains("| File | Change | Description |"));
        assert!(!body.contains("**"));
    }

    #[test]
    fn grouped_tables_when_any_entry_has_a_group() {
        let mut wt = base_walkthrough();
        wt.file_changes.push(WalkthroughFileEntry {
            path: PathBuf::from("src/lib.rs"),
            change_type: ChangeType::Modified,
            description: "wires module".into(),
            group: Some("Core".into()),
        });
        let body = render(&wt, &[], &[], "mira");
        assert!(body.contains("**Core**"));
        assert!(body.contains("**Other**"));
    }

    #[test]
    fn review_status_omitted_when_no_comments_and_no_existing() {
        let body = render(&base_walkthrough(), &[], &[], "mira");
        assert!(!body.contains("### Review Status"));
    }

    #[test]
    fn review_status_counts_by_severity_descending() {
        let comments = vec![comment(Severity::Nitpick), comment(Severity::Blocker), comment(Severity::Blocker)];
        let body = render(&base_walkthrough(), &comments, &[], "mira");
        let blocker_idx = body.find("blocker").unwrap();
        let nit_idx = body.find("nitpick").unwrap();
        assert!(blocker_idx < nit_idx);
        assert!(body.contains("| blocker | 2 |"));
    }

    #[test]
    fn review_status_includes_existing_row_with_plural_agreement() {
        let decisions = vec![
            ThreadDecision {
                thread_id: "t1".into(),
                path: PathBuf::from("a.rs"),
                line: 1,
                body: "b".into(),
                fixed: false,
            },
            ThreadDecision {
                thread_id: "t2".into(),
                path: PathBuf::from("a.rs"),
                line: 2,
                body: "b".into(),
                fixed: true,
            },
        ];
        let body = render(&base_walkthrough(), &[], &decisions, "mira");
        assert!(body.contains("| Existing | 1 unresolved issue |"));
    }

    #[test]
    fn sequence_diagram_wrapped_in_mermaid_fence() {
        let mut wt = base_walkthrough();
        wt.sequence_diagram = Some("A->>B: call".into());
        let body = render(&wt, &[], &[], "mira");
        assert!(body.contains("```mermaid\nA->>B: call\n```"));
    }

    #[test]
    fn footer_references_configured_bot_name() {
        let body = render(&base_walkthrough(), &[], &[], "custom-bot");
        assert!(body.contains("**custom-bot**"));
    }
}
