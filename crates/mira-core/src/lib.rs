//! Shared types, configuration, and error handling for the Mira review engine.
//!
//! This crate provides the foundation used by `mira-diff` and `mira-review`:
//! - [`MiraError`] — unified error type using `thiserror`
//! - [`MiraConfig`] — configuration loaded from `.mira.toml`
//! - Shared types: [`HunkInfo`], [`FileDiff`], [`PatchSet`], [`ReviewChunk`],
//!   [`Severity`], [`ReviewComment`], [`UnresolvedThread`], [`ThreadDecision`],
//!   [`WalkthroughResult`], [`ReviewResult`], [`PRInfo`], [`TokenUsage`]

pub mod config;
mod error;
mod types;

pub use config::{FilterConfig, LlmConfig, MiraConfig, ProviderConfig, ReviewConfig};
pub use error::MiraError;
pub use types::{
    ChangeType, FileDiff, HunkInfo, OutputFormat, PRInfo, PatchSet, ReviewChunk, ReviewComment,
    ReviewResult, Severity, ThreadDecision, TokenUsage, UnresolvedThread, WalkthroughEffort,
    WalkthroughFileEntry, WalkthroughResult,
};

/// A convenience `Result` type for Mira operations.
pub type Result<T> = std::result::Result<T, MiraError>;
