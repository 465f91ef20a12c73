use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A single hunk from a unified diff, scoped to one file.
///
/// Unlike a per-hunk record that also carries the file path and change type,
/// `HunkInfo` only describes the hunk itself — the owning [`FileDiff`] carries
/// the path and change classification once for all of its hunks.
///
/// # Examples
///
/// ```
/// use mira_core::HunkInfo;
///
/// let hunk = HunkInfo {
///     source_start: 10,
///     source_length: 5,
///     target_start: 10,
///     target_length: 8,
///     content: "@@ -10,5 +10,8 @@\n+ new line\n- old line".into(),
/// };
/// assert_eq!(hunk.target_start, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HunkInfo {
    /// Starting line in the source (old) version.
    pub source_start: u32,
    /// Number of lines the hunk spans in the source version.
    pub source_length: u32,
    /// Starting line in the target (new) version. Always ≥ 1.
    pub target_start: u32,
    /// Number of lines the hunk spans in the target version.
    pub target_length: u32,
    /// Raw diff content for this hunk, including the `@@ … @@` header.
    pub content: String,
}

impl HunkInfo {
    /// Last line (1-indexed, inclusive) this hunk's target range reaches.
    ///
    /// # Examples
    ///
    /// ```
    /// use mira_core::HunkInfo;
    ///
    /// let hunk = HunkInfo {
    ///     source_start: 1,
    ///     source_length: 1,
    ///     target_start: 10,
    ///     target_length: 5,
    ///     content: String::new(),
    /// };
    /// assert_eq!(hunk.target_end(), 14);
    /// ```
    pub fn target_end(&self) -> u32 {
        self.target_start + self.target_length.saturating_sub(1)
    }
}

/// Classification of how a file changed between the two diff sides.
///
/// Unlike a per-hunk `ChangeType`, this classifies the whole file once.
///
/// # Examples
///
/// ```
/// use mira_core::ChangeType;
///
/// let ct = ChangeType::Added;
/// assert_eq!(format!("{ct}"), "added");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    /// New file.
    Added,
    /// Existing file changed in place.
    Modified,
    /// File removed.
    Deleted,
    /// File moved/renamed (with or without content changes).
    Renamed,
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeType::Added => write!(f, "added"),
            ChangeType::Modified => write!(f, "modified"),
            ChangeType::Deleted => write!(f, "deleted"),
            ChangeType::Renamed => write!(f, "renamed"),
        }
    }
}

/// A single file's diff: its change type, language, and ordered hunks.
///
/// # Examples
///
/// ```
/// use mira_core::{ChangeType, FileDiff};
/// use std::path::PathBuf;
///
/// let diff = FileDiff {
///     path: PathBuf::from("src/lib.rs"),
///     change_type: ChangeType::Modified,
///     hunks: Vec::new(),
///     language: "rust".into(),
///     old_path: None,
///     is_binary: false,
///     added_lines: 3,
///     deleted_lines: 1,
/// };
/// assert_eq!(diff.language, "rust");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDiff {
    /// Path to the file in the target (new) tree, or the pre-deletion path for deletions.
    pub path: PathBuf,
    /// How the file changed.
    pub change_type: ChangeType,
    /// Ordered hunks, empty only when `is_binary`.
    pub hunks: Vec<HunkInfo>,
    /// Detected language, looked up by file-extension; empty string when unknown.
    pub language: String,
    /// Source path, present only when `change_type == Renamed`.
    pub old_path: Option<PathBuf>,
    /// Whether this entry is a binary file (no textual hunks).
    pub is_binary: bool,
    /// Total added lines across all hunks.
    pub added_lines: u32,
    /// Total deleted lines across all hunks.
    pub deleted_lines: u32,
}

impl FileDiff {
    /// Total churn (added + deleted lines), used for priority sorting.
    ///
    /// # Examples
    ///
    /// ```
    /// use mira_core::{ChangeType, FileDiff};
    /// use std::path::PathBuf;
    ///
    /// let diff = FileDiff {
    ///     path: PathBuf::from("a.rs"),
    ///     change_type: ChangeType::Modified,
    ///     hunks: Vec::new(),
    ///     language: String::new(),
    ///     old_path: None,
    ///     is_binary: false,
    ///     added_lines: 4,
    ///     deleted_lines: 2,
    /// };
    /// assert_eq!(diff.churn(), 6);
    /// ```
    pub fn churn(&self) -> u32 {
        self.added_lines + self.deleted_lines
    }
}

/// An ordered set of file diffs parsed from one unified-diff payload.
///
/// `PatchSet` exclusively owns its `FileDiff`s; there are no cyclic references.
///
/// # Examples
///
/// ```
/// use mira_core::PatchSet;
///
/// let patch = PatchSet { files: Vec::new() };
/// assert!(patch.files.is_empty());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchSet {
    /// Files in parse order.
    pub files: Vec<FileDiff>,
}

/// A set of files packed to fit one LLM context window.
///
/// # Examples
///
/// ```
/// use mira_core::ReviewChunk;
///
/// let chunk = ReviewChunk { files: Vec::new(), token_estimate: 0 };
/// assert_eq!(chunk.token_estimate, 0);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewChunk {
    /// Files placed in this chunk.
    pub files: Vec<FileDiff>,
    /// Estimated token cost of rendering this chunk's diffs into a prompt.
    pub token_estimate: usize,
}

/// Ordered severity level for review comments.
///
/// Total order: `Nitpick < Suggestion < Warning < Blocker`. `Blocker` is the
/// highest severity and, if present in a final review, causes a non-zero CLI
/// exit status.
///
/// # Examples
///
/// ```
/// use mira_core::Severity;
///
/// assert!(Severity::Blocker > Severity::Warning);
/// let s: Severity = "critical".parse().unwrap();
/// assert_eq!(s, Severity::Blocker);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Cosmetic or stylistic observation.
    Nitpick,
    /// Optional improvement, not a defect.
    Suggestion,
    /// Likely defect worth fixing before merge.
    Warning,
    /// Must-fix issue; causes CI to fail.
    Blocker,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Nitpick => write!(f, "nitpick"),
            Severity::Suggestion => write!(f, "suggestion"),
            Severity::Warning => write!(f, "warning"),
            Severity::Blocker => write!(f, "blocker"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    /// Accepts canonical names plus the aliases `critical`/`error` (→ Blocker),
    /// `warn` (→ Warning), and `nit`/`style` (→ Nitpick).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "nitpick" | "nit" | "style" => Ok(Severity::Nitpick),
            "suggestion" => Ok(Severity::Suggestion),
            "warning" | "warn" => Ok(Severity::Warning),
            "blocker" | "critical" | "error" => Ok(Severity::Blocker),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// A single review comment produced by the AI reviewer.
///
/// Mutated only via a functional "copy with a new severity" update performed
/// by the severity classifier; otherwise immutable once parsed.
///
/// # Examples
///
/// ```
/// use mira_core::{ReviewComment, Severity};
/// use std::path::PathBuf;
///
/// let comment = ReviewComment {
///     path: PathBuf::from("src/auth.rs"),
///     line: 42,
///     end_line: None,
///     severity: Severity::Warning,
///     category: "correctness".into(),
///     title: "Possible null dereference".into(),
///     body: "The pointer is used without a prior null check.".into(),
///     confidence: 0.95,
///     suggestion: Some("Add a None check".into()),
///     agent_prompt: None,
/// };
/// assert_eq!(comment.severity, Severity::Warning);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewComment {
    /// Path to the file being commented on.
    pub path: PathBuf,
    /// Line number in the new version of the file. Always ≥ 1.
    pub line: u32,
    /// Optional end line of a multi-line span; when set, always `> line`.
    pub end_line: Option<u32>,
    /// Severity of the finding.
    pub severity: Severity,
    /// Free-form category tag (e.g. `"security"`, `"style"`).
    pub category: String,
    /// Short title, truncated to 80 characters.
    pub title: String,
    /// Explanation of the issue.
    pub body: String,
    /// LLM self-rated confidence in `[0, 1]`.
    pub confidence: f64,
    /// Optional fix suggestion; when set, `body` is non-empty.
    pub suggestion: Option<String>,
    /// Optional follow-up prompt for a coding agent to apply the fix.
    pub agent_prompt: Option<String>,
}

impl ReviewComment {
    /// Returns a copy of this comment with its severity replaced.
    ///
    /// The classifier never mutates a `ReviewComment` in place; this is the
    /// only sanctioned way to change a comment's severity after parsing.
    ///
    /// # Examples
    ///
    /// ```
    /// use mira_core::{ReviewComment, Severity};
    /// use std::path::PathBuf;
    ///
    /// let comment = ReviewComment {
    ///     path: PathBuf::from("a.rs"),
    ///     line: 1,
    ///     end_line: None,
    ///     severity: Severity::Warning,
    ///     category: "security".into(),
    ///     title: "t".into(),
    ///     body: "b".into(),
    ///     confidence: 0.9,
    ///     suggestion: None,
    ///     agent_prompt: None,
    /// };
    /// let escalated = comment.with_severity(Severity::Blocker);
    /// assert_eq!(escalated.severity, Severity::Blocker);
    /// ```
    pub fn with_severity(&self, severity: Severity) -> Self {
        Self {
            severity,
            ..self.clone()
        }
    }
}

/// A previously posted, still-unresolved review thread on a pull request.
///
/// # Examples
///
/// ```
/// use mira_core::UnresolvedThread;
/// use std::path::PathBuf;
///
/// let thread = UnresolvedThread {
///     thread_id: "t1".into(),
///     path: PathBuf::from("src/lib.rs"),
///     line: 10,
///     body: "Missing null check".into(),
///     is_outdated: false,
/// };
/// assert!(!thread.is_outdated);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedThread {
    /// Opaque identity from the hosting provider.
    pub thread_id: String,
    /// File the thread is anchored to.
    pub path: PathBuf,
    /// Anchor line; 0 means unknown or outdated.
    pub line: u32,
    /// The thread's (cleaned) posted body.
    pub body: String,
    /// Whether the provider reports the anchor as stale.
    pub is_outdated: bool,
}

/// Verify-fixes' per-thread fixed/not-fixed decision.
///
/// # Examples
///
/// ```
/// use mira_core::ThreadDecision;
/// use std::path::PathBuf;
///
/// let decision = ThreadDecision {
///     thread_id: "t1".into(),
///     path: PathBuf::from("src/lib.rs"),
///     line: 10,
///     body: "Missing null check".into(),
///     fixed: true,
/// };
/// assert!(decision.fixed);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadDecision {
    /// Thread this decision covers.
    pub thread_id: String,
    /// File the thread is anchored to.
    pub path: PathBuf,
    /// Anchor line.
    pub line: u32,
    /// The thread's (cleaned) posted body.
    pub body: String,
    /// Whether the model determined the issue is now fixed.
    pub fixed: bool,
}

/// Estimated effort to review a change, attached to a walkthrough.
///
/// # Examples
///
/// ```
/// use mira_core::WalkthroughEffort;
///
/// let effort = WalkthroughEffort { level: "medium".into(), label: "Moderate".into(), minutes: 20 };
/// assert_eq!(effort.minutes, 20);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkthroughEffort {
    /// Coarse level (`"low"`, `"medium"`, `"high"`).
    pub level: String,
    /// Human-readable label shown in the walkthrough.
    pub label: String,
    /// Estimated minutes to review.
    pub minutes: u32,
}

/// A single file row in the walkthrough's "Changes" table.
///
/// # Examples
///
/// ```
/// use mira_core::{ChangeType, WalkthroughFileEntry};
/// use std::path::PathBuf;
///
/// let entry = WalkthroughFileEntry {
///     path: PathBuf::from("src/lib.rs"),
///     change_type: ChangeType::Modified,
///     description: "Adds retry logic".into(),
///     group: Some("core".into()),
/// };
/// assert_eq!(entry.group.as_deref(), Some("core"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkthroughFileEntry {
    /// File this row describes.
    pub path: PathBuf,
    /// How the file changed.
    pub change_type: ChangeType,
    /// One-line natural-language description of the change.
    pub description: String,
    /// Optional group label; when any entry has one, the table is grouped.
    pub group: Option<String>,
}

/// The assembled high-level walkthrough for a pull request.
///
/// # Examples
///
/// ```
/// use mira_core::WalkthroughResult;
///
/// let walkthrough = WalkthroughResult {
///     summary: "Adds retry logic to the HTTP client.".into(),
///     file_changes: Vec::new(),
///     effort: None,
///     sequence_diagram: None,
/// };
/// assert!(walkthrough.file_changes.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkthroughResult {
    /// Summary paragraph.
    pub summary: String,
    /// Per-file change rows.
    pub file_changes: Vec<WalkthroughFileEntry>,
    /// Optional effort estimate.
    pub effort: Option<WalkthroughEffort>,
    /// Optional Mermaid sequence diagram body (without the fence).
    pub sequence_diagram: Option<String>,
}

/// Token accounting for a pipeline run, accumulated by the LLM client.
///
/// `total_tokens` is derived, not stored, so it can never drift from its
/// components.
///
/// # Examples
///
/// ```
/// use mira_core::TokenUsage;
///
/// let usage = TokenUsage { prompt_tokens: 100, completion_tokens: 40 };
/// assert_eq!(usage.total_tokens(), 140);
/// ```
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    /// Tokens sent across every prompt in the run.
    pub prompt_tokens: u64,
    /// Tokens received across every completion in the run.
    pub completion_tokens: u64,
}

impl TokenUsage {
    /// Sum of prompt and completion tokens.
    pub fn total_tokens(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    /// Add another usage's counts into this one, in place.
    ///
    /// # Examples
    ///
    /// ```
    /// use mira_core::TokenUsage;
    ///
    /// let mut total = TokenUsage::default();
    /// total.accumulate(&TokenUsage { prompt_tokens: 10, completion_tokens: 5 });
    /// total.accumulate(&TokenUsage { prompt_tokens: 20, completion_tokens: 8 });
    /// assert_eq!(total.total_tokens(), 43);
    /// ```
    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// Pull-request metadata fetched by a provider.
///
/// # Examples
///
/// ```
/// use mira_core::PRInfo;
///
/// let pr = PRInfo {
///     title: "Add retries".into(),
///     description: "Retries transient failures".into(),
///     base_branch: "main".into(),
///     head_branch: "feature/retries".into(),
///     url: "https://example.com/pr/1".into(),
///     number: 1,
///     owner: "acme".into(),
///     repo: "widgets".into(),
/// };
/// assert_eq!(pr.number, 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PRInfo {
    /// PR title.
    pub title: String,
    /// PR description/body.
    pub description: String,
    /// Branch the PR merges into.
    pub base_branch: String,
    /// Branch the PR merges from.
    pub head_branch: String,
    /// Web URL of the PR.
    pub url: String,
    /// PR number within its repository.
    pub number: u64,
    /// Repository owner/organization.
    pub owner: String,
    /// Repository name.
    pub repo: String,
}

/// Final pipeline output for one review run.
///
/// # Examples
///
/// ```
/// use mira_core::{ReviewResult, TokenUsage};
///
/// let result = ReviewResult {
///     comments: Vec::new(),
///     summary: "No issues found.".into(),
///     reviewed_files: 0,
///     skipped_reason: Some("no files matched the filter".into()),
///     token_usage: TokenUsage::default(),
///     walkthrough: None,
///     thread_decisions: Vec::new(),
/// };
/// assert_eq!(result.reviewed_files, 0);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResult {
    /// Final, filtered review comments.
    pub comments: Vec<ReviewComment>,
    /// High-level textual summary.
    pub summary: String,
    /// Number of files actually sent to the reviewer.
    pub reviewed_files: usize,
    /// Set when the pipeline exited early (e.g. everything was filtered out).
    pub skipped_reason: Option<String>,
    /// Accumulated token usage for this run.
    pub token_usage: TokenUsage,
    /// Assembled walkthrough, when one was produced.
    pub walkthrough: Option<WalkthroughResult>,
    /// Per-thread verify-fixes outcomes.
    pub thread_decisions: Vec<ThreadDecision>,
}

impl ReviewResult {
    /// `true` if any retained comment is [`Severity::Blocker`].
    ///
    /// The CLI uses this to decide its exit status.
    ///
    /// # Examples
    ///
    /// ```
    /// use mira_core::{ReviewComment, ReviewResult, Severity, TokenUsage};
    /// use std::path::PathBuf;
    ///
    /// let blocker = ReviewComment {
    ///     path: PathBuf::from("a.rs"),
    ///     line: 1,
    ///     end_line: None,
    ///     severity: Severity::Blocker,
    ///     category: "security".into(),
    ///     title: "t".into(),
    ///     body: "b".into(),
    ///     confidence: 0.9,
    ///     suggestion: None,
    ///     agent_prompt: None,
    /// };
    /// let result = ReviewResult {
    ///     comments: vec![blocker],
    ///     summary: String::new(),
    ///     reviewed_files: 1,
    ///     skipped_reason: None,
    ///     token_usage: TokenUsage::default(),
    ///     walkthrough: None,
    ///     thread_decisions: Vec::new(),
    /// };
    /// assert!(result.has_blocker());
    /// ```
    pub fn has_blocker(&self) -> bool {
        self.comments.iter().any(|c| c.severity == Severity::Blocker)
    }
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use mira_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable tables and summaries.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
