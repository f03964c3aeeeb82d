//! Prompts-related command implementations

use anyhow::{bail, Result};
use sobi_core::{
    prompts::default_prompts_dir,
    Config, PromptId,
};

use super::prompt_library;

/// List all available prompts and their override status
pub fn cmd_prompts_list(config: &Config) -> Result<()> {
    let mut library = prompt_library(config);
    let prompts = library.list();

    println!("Available Prompts:\n");

    // Header
    println!(
        "{:<25} {:>7}  {:<16}  {}",
        "ID", "VERSION", "TASK", "OVERRIDE"
    );
    println!("{}", "-".repeat(64));

    for info in prompts {
        let override_status = if info.has_override {
            "✓ Custom"
        } else {
            "Default"
        };

        println!(
            "{:<25} {:>7}  {:<16}  {}",
            info.id, info.version, info.task, override_status
        );
    }

    println!();
    cmd_prompts_path(config)?;

    println!();
    println!("To customize a prompt:");
    println!("  1. Copy the default to the override directory as <id>.md");
    println!("  2. Edit the file with your changes");
    println!("  3. Restart the server to use the new prompt");

    Ok(())
}

/// Show the content of a specific prompt
pub fn cmd_prompts_show(config: &Config, prompt_id: &str) -> Result<()> {
    let Some(id) = PromptId::parse(prompt_id) else {
        let available: Vec<&str> = PromptId::all().iter().map(|id| id.as_str()).collect();
        bail!(
            "Unknown prompt ID: {} (available: {})",
            prompt_id,
            available.join(", ")
        );
    };

    let mut library = prompt_library(config);
    let prompt = library.get(id)?;

    println!("Prompt: {}", prompt.metadata.id);
    println!("Version: {}", prompt.metadata.version);
    println!("Task: {}", prompt.metadata.task);
    println!(
        "Source: {}",
        if prompt.is_override {
            "Override"
        } else {
            "Default"
        }
    );

    if let Some(ref path) = prompt.override_path {
        println!("Override Path: {}", path.display());
    }

    println!();
    println!("--- Content ---");
    println!("{}", prompt.content);

    Ok(())
}

/// Show the path where prompt overrides should be placed
pub fn cmd_prompts_path(config: &Config) -> Result<()> {
    let dir = config
        .prompt_override_dir
        .clone()
        .or_else(default_prompts_dir);

    match dir {
        Some(path) => {
            println!("Override directory: {}", path.display());
            if !path.exists() {
                println!("  (does not exist yet; create it to start adding custom prompts)");
            }
        }
        None => {
            println!("Override directory: (not available on this system)");
        }
    }

    Ok(())
}
