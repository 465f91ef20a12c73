use std::path::PathBuf;

/// Errors that can occur across the Mira review engine.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary crate converts to `anyhow::Error` at the boundary.
///
/// `ProviderTransient` and `ProviderPermanent` are kept as distinct variants
/// rather than a single `Provider(String)` so retry logic can match on kind
/// instead of inspecting a message string.
///
/// # Examples
///
/// ```
/// use mira_core::MiraError;
///
/// let err = MiraError::Config("missing API key".into());
/// assert!(err.to_string().contains("missing API key"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum MiraError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Unified diff could not be parsed.
    #[error("diff parse error: {0}")]
    DiffParse(String),

    /// LLM call failed after retries and fallback.
    #[error("LLM error: {0}")]
    Llm(String),

    /// LLM response failed schema validation or JSON parsing.
    #[error("response parse error: {0}")]
    ResponseParse(String),

    /// Transient hosting-provider failure (network, 5xx). Safe to retry.
    #[error("provider error (transient): {0}")]
    ProviderTransient(String),

    /// Permanent hosting-provider failure (auth, not found). Not retried.
    #[error("provider error: {0}")]
    ProviderPermanent(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// The operation was cancelled via a caller-supplied cancellation signal.
    #[error("operation cancelled")]
    Cancelled,
}
