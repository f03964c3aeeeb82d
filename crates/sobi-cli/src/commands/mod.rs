//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `analyze` - Overspending analysis over a JSON file
//! - `classify` - Full pipeline classification and keyword-only matching
//! - `config` - Effective configuration printout
//! - `prompts` - Prompt library management commands
//! - `recommend` - Savings product recommendation over a JSON file
//! - `serve` - Web server command

pub mod analyze;
pub mod classify;
pub mod config;
pub mod prompts;
pub mod recommend;
pub mod serve;

// Re-export command functions for main.rs
pub use analyze::*;
pub use classify::*;
pub use config::*;
pub use prompts::*;
pub use recommend::*;
pub use serve::*;

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use sobi_core::{Config, LlmClient, PromptLibrary};
use tracing::debug;

/// Resolve the effective configuration (file, then environment)
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = Config::load(path).context("Failed to load configuration")?;
    debug!(
        source = ?config.source,
        backend = ?config.llm.backend,
        "Configuration loaded"
    );
    Ok(config)
}

/// LLM client described by the `[llm]` section
pub fn build_client(config: &Config) -> Result<LlmClient> {
    LlmClient::from_config(&config.llm).context("Failed to create LLM client")
}

/// Prompt library honoring the configured override directory
pub fn prompt_library(config: &Config) -> PromptLibrary {
    PromptLibrary::from_override(config.prompt_override_dir.clone())
}

/// Read and parse a JSON input file
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
