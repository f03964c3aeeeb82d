//! Configuration printout

use anyhow::Result;
use sobi_core::Config;

/// Print the effective configuration as TOML
///
/// The API key never appears in the output, only whether one is set.
pub fn cmd_config(config: &Config) -> Result<()> {
    match config.source {
        Some(ref path) => println!("# Loaded from {}", path.display()),
        None => println!("# Built-in defaults (no config file found)"),
    }
    println!(
        "# API key: {}",
        if config.llm.api_key.is_some() {
            "set (redacted)"
        } else {
            "not set"
        }
    );
    println!();
    print!("{}", config.to_toml_string()?);

    Ok(())
}
