//! Savings recommendation command

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use sobi_core::{
    models::{SavingsProduct, UserProfile},
    Config, RecommendationRanker,
};

use super::{build_client, prompt_library, read_json_file};

/// Recommendation input file
#[derive(Debug, Deserialize)]
pub struct RecommendInput {
    pub products: Vec<SavingsProduct>,
    #[serde(default)]
    pub profile: UserProfile,
}

pub async fn cmd_recommend(config: &Config, file: &Path) -> Result<()> {
    let input: RecommendInput = read_json_file(file)?;

    let ranker =
        RecommendationRanker::from_config(build_client(config)?, config, &mut prompt_library(config))?;
    let picked = ranker
        .recommend(&input.products, &input.profile)
        .await
        .context("Recommendation failed")?;

    if picked.value().is_empty() {
        println!("No candidate products given.");
        return Ok(());
    }

    println!("Recommended savings products:\n");
    for (rank, p) in picked.value().iter().enumerate() {
        println!(
            "  {}. [{}] {} - {} (base {:.2}%, up to {:.2}%)",
            rank + 1,
            p.product_code,
            p.provider_name,
            p.product_name,
            p.base_rate,
            p.max_rate()
        );
    }
    if let Some(reason) = picked.reason() {
        println!();
        println!("⚠️  Padded from candidate order: {}", reason);
    }

    Ok(())
}
