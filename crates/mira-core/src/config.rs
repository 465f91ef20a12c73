use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::MiraError;
use crate::types::Severity;

/// Top-level configuration loaded from `.mira.toml`.
///
/// Every field is defaulted via `#[serde(default)]`, so a missing file — or a
/// file missing entire sections — degrades to [`MiraConfig::default`].
///
/// # Examples
///
/// ```
/// use mira_core::MiraConfig;
///
/// let config = MiraConfig::default();
/// assert_eq!(config.filter.max_comments, 5);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MiraConfig {
    /// LLM provider settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Noise-filter settings.
    #[serde(default)]
    pub filter: FilterConfig,
    /// Review pipeline behavior settings.
    #[serde(default)]
    pub review: ReviewConfig,
    /// Hosting-provider selection.
    #[serde(default)]
    pub provider: ProviderConfig,
}

impl MiraConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`MiraError::Io`] if the file cannot be read, or
    /// [`MiraError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mira_core::MiraConfig;
    /// use std::path::Path;
    ///
    /// let config = MiraConfig::from_file(Path::new(".mira.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, MiraError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`MiraError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use mira_core::MiraConfig;
    ///
    /// let toml = r#"
    /// [filter]
    /// max_comments = 10
    /// "#;
    /// let config = MiraConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.filter.max_comments, 10);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, MiraError> {
        let mut config: Self = toml::from_str(content)?;
        if config.llm.model.is_none() {
            if let Ok(model) = std::env::var("MIRA_MODEL") {
                config.llm.model = Some(model);
            }
        }
        Ok(config)
    }
}

/// Walk upward from `start` looking for a `.mira.toml` file.
///
/// Returns the first match, or `None` if the filesystem root is reached
/// without finding one.
///
/// # Examples
///
/// ```
/// use mira_core::config::find_config_file;
/// use std::fs;
///
/// let dir = tempfile::tempdir().unwrap();
/// let nested = dir.path().join("a/b/c");
/// fs::create_dir_all(&nested).unwrap();
/// fs::write(dir.path().join(".mira.toml"), "").unwrap();
///
/// let found = find_config_file(&nested).unwrap();
/// assert_eq!(found, dir.path().join(".mira.toml"));
/// ```
pub fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(d) = dir {
        let candidate = d.join(".mira.toml");
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = d.parent();
    }
    None
}

/// LLM provider configuration.
///
/// # Examples
///
/// ```
/// use mira_core::LlmConfig;
///
/// let config = LlmConfig::default();
/// assert_eq!(config.temperature, 0.2);
/// assert_eq!(config.max_tokens, 4096);
/// assert_eq!(config.max_context_tokens, 120_000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Primary model identifier. `None` defers to the `MIRA_MODEL` env var.
    pub model: Option<String>,
    /// Model tried once, with the same retry policy, if the primary exhausts retries.
    pub fallback_model: Option<String>,
    /// Default sampling temperature for review/walkthrough calls.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Completion token cap.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Chunking budget; the chunker reserves a fixed prompt overhead from this.
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,
    /// API key for the provider. Usually supplied via environment instead.
    pub api_key: Option<String>,
    /// Custom base URL for API requests (OpenAI-compatible `/v1/chat/completions`).
    pub base_url: Option<String>,
}

fn default_temperature() -> f64 {
    0.2
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_max_context_tokens() -> usize {
    120_000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: None,
            fallback_model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_context_tokens: default_max_context_tokens(),
            api_key: None,
            base_url: None,
        }
    }
}

/// Noise-filter configuration: thresholds, caps, and path exclusions.
///
/// # Examples
///
/// ```
/// use mira_core::FilterConfig;
/// use mira_core::Severity;
///
/// let config = FilterConfig::default();
/// assert_eq!(config.confidence_threshold, 0.7);
/// assert_eq!(config.max_comments, 5);
/// assert_eq!(config.min_severity, Severity::Nitpick);
/// assert!(config.exclude_deleted);
/// assert_eq!(config.max_files, 50);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Minimum LLM confidence to keep a comment.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Post-dedup cap on the number of comments returned.
    #[serde(default = "default_max_comments")]
    pub max_comments: usize,
    /// Severity floor; comments below this are dropped.
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,
    /// Additional glob patterns to skip before sending to the LLM.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Skip file deletions during filtering.
    #[serde(default = "default_exclude_deleted")]
    pub exclude_deleted: bool,
    /// Cap on the number of files considered per review.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

fn default_confidence_threshold() -> f64 {
    0.7
}

fn default_max_comments() -> usize {
    5
}

fn default_min_severity() -> Severity {
    Severity::Nitpick
}

fn default_exclude_deleted() -> bool {
    true
}

fn default_max_files() -> usize {
    50
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            max_comments: default_max_comments(),
            min_severity: default_min_severity(),
            exclude_patterns: Vec::new(),
            exclude_deleted: default_exclude_deleted(),
            max_files: default_max_files(),
        }
    }
}

/// Review pipeline behavior configuration.
///
/// # Examples
///
/// ```
/// use mira_core::ReviewConfig;
///
/// let config = ReviewConfig::default();
/// assert_eq!(config.context_lines, 3);
/// assert_eq!(config.max_diff_size, 50_000);
/// assert!(config.include_summary);
/// assert!(!config.focus_only_on_problems);
/// assert!(config.walkthrough);
/// assert!(config.walkthrough_sequence_diagram);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Hunk-merge context window, in lines.
    #[serde(default = "default_context_lines")]
    pub context_lines: u32,
    /// Pre-truncation cap on raw diff size, in bytes.
    #[serde(default = "default_max_diff_size")]
    pub max_diff_size: usize,
    /// Include a high-level summary in the final result.
    #[serde(default = "default_true")]
    pub include_summary: bool,
    /// When true, suppress purely stylistic commentary.
    #[serde(default)]
    pub focus_only_on_problems: bool,
    /// Produce and post a walkthrough comment.
    #[serde(default = "default_true")]
    pub walkthrough: bool,
    /// Allow the walkthrough to include a Mermaid sequence diagram.
    #[serde(default = "default_true")]
    pub walkthrough_sequence_diagram: bool,
}

fn default_context_lines() -> u32 {
    3
}

fn default_max_diff_size() -> usize {
    50_000
}

fn default_true() -> bool {
    true
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            context_lines: default_context_lines(),
            max_diff_size: default_max_diff_size(),
            include_summary: true,
            focus_only_on_problems: false,
            walkthrough: true,
            walkthrough_sequence_diagram: true,
        }
    }
}

/// Hosting-provider selection, consumed by the provider registry.
///
/// # Examples
///
/// ```
/// use mira_core::ProviderConfig;
///
/// let config = ProviderConfig::default();
/// assert_eq!(config.r#type, "github");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Identifier looked up in the provider registry (e.g. `"github"`).
    #[serde(default = "default_provider_type", rename = "type")]
    pub r#type: String,
    /// Login of the bot account whose threads/comments this tool manages.
    #[serde(default = "default_bot_name")]
    pub bot_name: String,
}

fn default_provider_type() -> String {
    "github".into()
}

fn default_bot_name() -> String {
    "mira".into()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            r#type: default_provider_type(),
            bot_name: default_bot_name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let config = MiraConfig::default();
        assert_eq!(config.filter.max_comments, 5);
        assert_eq!(config.filter.confidence_threshold, 0.7);
        assert_eq!(config.filter.min_severity, Severity::Nitpick);
        assert_eq!(config.review.max_diff_size, 50_000);
        assert_eq!(config.llm.temperature, 0.2);
        assert_eq!(config.llm.max_tokens, 4096);
        assert_eq!(config.llm.max_context_tokens, 120_000);
        assert_eq!(config.provider.r#type, "github");
        assert!(config.filter.exclude_deleted);
        assert!(config.filter.exclude_patterns.is_empty());
    }

    #[test]
    fn parse_minimal_toml() {
        let toml = r#"
[filter]
max_comments = 10
confidence_threshold = 0.85
"#;
        let config = MiraConfig::from_toml(toml).unwrap();
        assert_eq!(config.filter.max_comments, 10);
        assert_eq!(config.filter.confidence_threshold, 0.85);
    }

    #[test]
    fn parse_full_toml() {
        let toml = r#"
[llm]
model = "gpt-4o"
fallback_model = "gpt-4o-mini"
temperature = 0.1
max_tokens = 2048
max_context_tokens = 60000

[filter]
max_comments = 3
min_severity = "warning"
exclude_patterns = ["*.lock", "dist/**"]

[review]
context_lines = 5
max_diff_size = 10000

[provider]
type = "github"
bot_name = "review-bot"
"#;
        let config = MiraConfig::from_toml(toml).unwrap();
        assert_eq!(config.llm.model.as_deref(), Some("gpt-4o"));
        assert_eq!(config.llm.fallback_model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(config.filter.max_comments, 3);
        assert_eq!(config.filter.min_severity, Severity::Warning);
        assert_eq!(config.review.context_lines, 5);
        assert_eq!(config.provider.bot_name, "review-bot");
    }

    #[test]
    fn empty_toml_gives_defaults() {
        let config = MiraConfig::from_toml("").unwrap();
        assert_eq!(config.filter.max_comments, 5);
        assert_eq!(config.provider.r#type, "github");
    }

    #[test]
    fn invalid_toml_returns_error() {
        let result = MiraConfig::from_toml("{{invalid}}");
        assert!(result.is_err());
    }

    #[test]
    fn env_override_fills_missing_model() {
        std::env::set_var("MIRA_MODEL", "env-model");
        let config = MiraConfig::from_toml("").unwrap();
        assert_eq!(config.llm.model.as_deref(), Some("env-model"));
        std::env::remove_var("MIRA_MODEL");
    }

    #[test]
    fn configured_model_wins_over_env() {
        std::env::set_var("MIRA_MODEL", "env-model");
        let config = MiraConfig::from_toml("[llm]\nmodel = \"configured\"\n").unwrap();
        assert_eq!(config.llm.model.as_deref(), Some("configured"));
        std::env::remove_var("MIRA_MODEL");
    }

    #[test]
    fn find_config_file_walks_upward() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join(".mira.toml"), "").unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, dir.path().join(".mira.toml"));
    }

    #[test]
    fn find_config_file_returns_none_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        assert!(find_config_file(dir.path()).is_none());
    }
}
