//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Sobi - Classify spending and find where it leaks
#[derive(Parser)]
#[command(name = "sobi")]
#[command(about = "Expenditure classification and spending-insight service", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config file (defaults to $SOBI_CONFIG, then the data directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server
    Serve {
        /// Host to bind to (overrides [server].host)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides [server].port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Classify expenditure descriptions (ids are assigned 1..n)
    Classify {
        /// Descriptions to classify
        #[arg(required = true)]
        descriptions: Vec<String>,

        /// Print the raw JSON response instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Test a description against the keyword table only (no LLM call)
    Match {
        /// Description to match
        description: String,
    },

    /// Rank the top overspending categories from a JSON file
    ///
    /// The file holds a list of {category_id, amount, expenditure_date}
    /// objects, either bare or wrapped as {"exps": [...]}.
    Analyze {
        /// JSON file with categorized spending
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Recommend savings products from a JSON file
    ///
    /// The file holds {"products": [...], "profile": {...}}.
    Recommend {
        /// JSON file with candidate products and the user profile
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Manage prompt templates
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },

    /// Print the effective configuration (API key redacted)
    Config,
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all available prompts and their override status
    List,

    /// Show the content of a specific prompt
    Show {
        /// Prompt ID (e.g., classify_expenditures, rank_overspending)
        prompt_id: String,
    },

    /// Show the path where prompt overrides should be placed
    Path,
}
