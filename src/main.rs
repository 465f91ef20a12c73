use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use mira_core::{MiraConfig, OutputFormat};
use mira_review::engine::ReviewEngine;

#[derive(Parser)]
#[command(
    name = "mira",
    version,
    about = "AI-assisted pull-request review engine",
    long_about = "Mira reviews a pull request's diff with an LLM — walkthrough, inline \
                   comments, and verification that earlier findings were actually fixed.\n\n\
                   The hosting-platform adapter (GitHub, GitLab, ...) is a separate \
                   collaborator; this binary is a thin entry point over the review engine."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (default: .mira.toml, discovered upward)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Review a pull request's diff and post comments
    Review {
        /// URL of the pull request to review
        pr_url: String,
        /// Compute the review without posting anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Re-check previously raised threads against the current diff
    VerifyFixes {
        /// URL of the pull request to verify
        pr_url: String,
        /// Compute decisions without resolving any thread
        #[arg(long)]
        dry_run: bool,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<MiraConfig> {
    match path {
        Some(path) => MiraConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => {
            let cwd = std::env::current_dir().context("failed to read current directory")?;
            match mira_core::config::find_config_file(&cwd) {
                Some(found) => MiraConfig::from_file(&found)
                    .with_context(|| format!("failed to load config from {}", found.display())),
                None => Ok(MiraConfig::default()),
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    if cli.verbose {
        eprintln!("format: {}", cli.format);
    }

    // No concrete Provider adapter is wired into this binary; a caller embeds
    // mira-review as a library and attaches one via ReviewEngine::with_provider.
    let (pr_url, dry_run, action) = match cli.command {
        Command::Review { pr_url, dry_run } => (pr_url, dry_run, "review"),
        Command::VerifyFixes { pr_url, dry_run } => (pr_url, dry_run, "verify-fixes"),
    };
    let _ = ReviewEngine::new(config)?;
    let _ = dry_run;
    anyhow::bail!(
        "no Provider configured for {pr_url}; '{action}' requires embedding mira-review with a \
         hosting-platform adapter attached via ReviewEngine::with_provider"
    )
}
