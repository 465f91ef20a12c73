//! Pre-LLM file filtering to eliminate noise at the source.
//!
//! Applies the ordered policy described by [`DiffFilter::filter`]: binaries
//! and excluded patterns are dropped first, then deletions and generated
//! files, then the remainder is priority-sorted and capped at `max_files`.

use std::path::PathBuf;

use mira_core::{ChangeType, FileDiff, FilterConfig};

/// Default glob patterns applied in addition to any configured
/// `exclude_patterns`: lock files, minified assets, binary media, archives.
const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "**/package-lock.json",
    "**/yarn.lock",
    "**/Cargo.lock",
    "**/pnpm-lock.yaml",
    "**/poetry.lock",
    "**/Gemfile.lock",
    "**/composer.lock",
    "**/go.sum",
    "**/*.min.js",
    "**/*.min.css",
    "**/*.png",
    "**/*.jpg",
    "**/*.jpeg",
    "**/*.gif",
    "**/*.ico",
    "**/*.woff",
    "**/*.woff2",
    "**/*.zip",
    "**/*.tar.gz",
    "**/vendor/**",
    "**/third_party/**",
    "**/node_modules/**",
];

/// Markers that identify generated content in a hunk's first few lines.
const GENERATED_MARKERS: &[&str] = &[
    "do not edit",
    "auto-generated",
    "autogenerated",
    "code generated",
    "@generated",
];

/// Applies the file filter policy ahead of LLM review.
///
/// # Examples
///
/// ```
/// use mira_core::FilterConfig;
/// use mira_diff::filter::DiffFilter;
///
/// let filter = DiffFilter::from_config(&FilterConfig::default());
/// assert!(filter.should_skip("Cargo.lock"));
/// assert!(!filter.should_skip("src/main.rs"));
/// ```
pub struct DiffFilter {
    patterns: Vec<glob::Pattern>,
    exclude_deleted: bool,
    max_files: usize,
}

impl DiffFilter {
    /// Build a filter from noise-filter configuration.
    ///
    /// Invalid glob patterns in `config.exclude_patterns` are ignored rather
    /// than treated as a hard error.
    ///
    /// # Examples
    ///
    /// ```
    /// use mira_core::FilterConfig;
    /// use mira_diff::filter::DiffFilter;
    ///
    /// let config = FilterConfig {
    ///     exclude_patterns: vec!["*.snap".into()],
    ///     ..FilterConfig::default()
    /// };
    /// let filter = DiffFilter::from_config(&config);
    /// assert!(filter.should_skip("component.snap"));
    /// ```
    pub fn from_config(config: &FilterConfig) -> Self {
        let mut patterns = Vec::new();
        for pat in DEFAULT_EXCLUDE_PATTERNS.iter().copied().chain(
            config
                .exclude_patterns
                .iter()
                .map(std::string::String::as_str),
        ) {
            if let Ok(p) = glob::Pattern::new(pat) {
                patterns.push(p);
            }
        }

        Self {
            patterns,
            exclude_deleted: config.exclude_deleted,
            max_files: config.max_files,
        }
    }

    /// Check whether a bare path would be excluded by the glob patterns.
    ///
    /// Only covers step 2 of the policy (pattern exclusion); it does not
    /// consider binary, deletion, or generated-file status since those need
    /// a full `FileDiff`.
    ///
    /// # Examples
    ///
    /// ```
    /// use mira_core::FilterConfig;
    /// use mira_diff::filter::DiffFilter;
    ///
    /// let filter = DiffFilter::from_config(&FilterConfig::default());
    /// assert!(filter.should_skip("vendor/lib.js"));
    /// assert!(!filter.should_skip("src/lib.rs"));
    /// ```
    pub fn should_skip(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }

    /// Apply the full ordered filter policy to a set of file diffs.
    ///
    /// # Examples
    ///
    /// ```
    /// use mira_core::FilterConfig;
    /// use mira_diff::filter::DiffFilter;
    /// use mira_diff::parser::parse_unified_diff;
    ///
    /// let diff = "diff --git a/src/main.rs b/src/main.rs\n\
    ///             --- a/src/main.rs\n\
    ///             +++ b/src/main.rs\n\
    ///             @@ -1,2 +1,3 @@\n\
    ///              line\n\
    ///             +new\n";
    /// let patch = parse_unified_diff(diff).unwrap();
    /// let filter = DiffFilter::from_config(&FilterConfig::default());
    /// let result = filter.filter(patch.files);
    /// assert_eq!(result.kept.len(), 1);
    /// assert!(result.skipped.is_empty());
    /// ```
    pub fn filter(&self, files: Vec<FileDiff>) -> FilterResult {
        let mut skipped = Vec::new();
        let mut remaining = Vec::new();

        for file in files {
            if file.is_binary {
                skipped.push(SkippedFile {
                    path: file.path.clone(),
                    reason: SkipReason::BinaryFile,
                });
                continue;
            }

            let path_str = file.path.to_string_lossy();
            if let Some(pat) = self.patterns.iter().find(|p| p.matches(&path_str)) {
                skipped.push(SkippedFile {
                    path: file.path.clone(),
                    reason: SkipReason::PatternMatch(pat.to_string()),
                });
                continue;
            }

            if self.exclude_deleted && file.change_type == ChangeType::Deleted {
                skipped.push(SkippedFile {
                    path: file.path.clone(),
                    reason: SkipReason::Deleted,
                });
                continue;
            }

            if is_generated(&file) {
                skipped.push(SkippedFile {
                    path: file.path.clone(),
                    reason: SkipReason::GeneratedFile,
                });
                continue;
            }

            remaining.push(file);
        }

        remaining.sort_by(|a, b| {
            priority(b.change_type)
                .cmp(&priority(a.change_type))
                .then_with(|| b.churn().cmp(&a.churn()))
        });

        if remaining.len() > self.max_files {
            for file in remaining.split_off(self.max_files) {
                skipped.push(SkippedFile {
                    path: file.path.clone(),
                    reason: SkipReason::OverCap,
                });
            }
        }

        FilterResult {
            kept: remaining,
            skipped,
        }
    }
}

/// Priority used in the step-5 sort: modified > added > renamed.
/// Deleted files never reach this sort when `exclude_deleted` is set, but a
/// defined ordering keeps the sort total either way.
fn priority(change_type: ChangeType) -> u8 {
    match change_type {
        ChangeType::Modified => 3,
        ChangeType::Added => 2,
        ChangeType::Renamed => 1,
        ChangeType::Deleted => 0,
    }
}

/// Scans the first hunk's first five lines for a generated-content marker.
// TODO: only the first hunk is scanned; a marker past line 5 of a later
// hunk (e.g. a transpiled bundle with its header mid-file) won't be caught.
fn is_generated(file: &FileDiff) -> bool {
    let Some(first_hunk) = file.hunks.first() else {
        return false;
    };

    for line in first_hunk.content.lines().take(5) {
        let lowered = line.to_lowercase();
        if GENERATED_MARKERS.iter().any(|m| lowered.contains(m)) {
            return true;
        }
    }
    false
}

/// Result of filtering a `PatchSet`'s files.
///
/// # Examples
///
/// ```
/// use mira_diff::filter::FilterResult;
///
/// let result = FilterResult {
///     kept: vec![],
///     skipped: vec![],
/// };
/// assert!(result.kept.is_empty());
/// ```
pub struct FilterResult {
    /// Files that passed the filter, in final review order.
    pub kept: Vec<FileDiff>,
    /// Files that were skipped, with reasons.
    pub skipped: Vec<SkippedFile>,
}

/// A file that was skipped during filtering.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use mira_diff::filter::{SkipReason, SkippedFile};
///
/// let skipped = SkippedFile {
///     path: PathBuf::from("package-lock.json"),
///     reason: SkipReason::PatternMatch("**/package-lock.json".into()),
/// };
/// assert!(matches!(skipped.reason, SkipReason::PatternMatch(_)));
/// ```
#[derive(Debug, Clone)]
pub struct SkippedFile {
    /// Path of the skipped file.
    pub path: PathBuf,
    /// Why the file was skipped.
    pub reason: SkipReason,
}

/// Reason a file was skipped, matching the ordered filter policy.
///
/// # Examples
///
/// ```
/// use mira_diff::filter::SkipReason;
///
/// let reason = SkipReason::BinaryFile;
/// assert_eq!(format!("{reason}"), "binary file");
/// ```
#[derive(Debug, Clone)]
pub enum SkipReason {
    /// Step 1: binary file, no textual hunks to review.
    BinaryFile,
    /// Step 2: matched a default or configured exclusion glob.
    PatternMatch(String),
    /// Step 3: file deletion, dropped per `exclude_deleted`.
    Deleted,
    /// Step 4: detected as generated content.
    GeneratedFile,
    /// Step 6: dropped past the `max_files` cap after priority sort.
    OverCap,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::BinaryFile => write!(f, "binary file"),
            SkipReason::PatternMatch(pat) => write!(f, "pattern: {pat}"),
            SkipReason::Deleted => write!(f, "deleted"),
            SkipReason::GeneratedFile => write!(f, "generated file"),
            SkipReason::OverCap => write!(f, "over max_files cap"),
        }
    }
}
