//! Sobi CLI - Expenditure classification and spending insights
//!
//! Usage:
//!   sobi serve --port 8000              Start the HTTP API
//!   sobi classify "스타벅스" "GS25"       Classify descriptions
//!   sobi match "카카오T 택시"             Keyword tier only
//!   sobi analyze --file spend.json      Rank overspending categories
//!   sobi recommend --file req.json      Recommend savings products

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => commands::cmd_serve(config, host, port).await,
        Commands::Classify { descriptions, json } => {
            commands::cmd_classify(&config, &descriptions, json).await
        }
        Commands::Match { description } => commands::cmd_match(&config, &description),
        Commands::Analyze { file } => commands::cmd_analyze(&config, &file).await,
        Commands::Recommend { file } => commands::cmd_recommend(&config, &file).await,
        Commands::Prompts { action } => match action {
            None | Some(PromptsAction::List) => commands::cmd_prompts_list(&config),
            Some(PromptsAction::Show { prompt_id }) => {
                commands::cmd_prompts_show(&config, &prompt_id)
            }
            Some(PromptsAction::Path) => commands::cmd_prompts_path(&config),
        },
        Commands::Config => commands::cmd_config(&config),
    }
}
