//! Classification command implementations

use anyhow::{Context, Result};
use sobi_core::{
    Category, Classification, ClassificationPipeline, Config, DecisionSource, Expenditure,
};

use super::{build_client, prompt_library, truncate};

/// Run the full pipeline over descriptions, numbering them 1..n
pub async fn classify_descriptions(config: &Config, descriptions: &[String]) -> Result<Classification> {
    let client = build_client(config)?;
    let pipeline = ClassificationPipeline::from_config(client, config, &mut prompt_library(config))?;

    let items: Vec<Expenditure> = descriptions
        .iter()
        .enumerate()
        .map(|(i, d)| Expenditure::new(i as i64 + 1, d.as_str()))
        .collect();

    pipeline
        .classify_with_stats(&items)
        .await
        .context("Classification failed")
}

pub async fn cmd_classify(config: &Config, descriptions: &[String], json: bool) -> Result<()> {
    let outcome = classify_descriptions(config, descriptions).await?;

    if json {
        let body = serde_json::json!({ "results": outcome.results });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    println!(
        "{:>4}  {:<28}  {:<8}  {}",
        "ID", "CATEGORY", "SOURCE", "DESCRIPTION"
    );
    println!("{}", "-".repeat(72));

    for ((result, source), description) in outcome
        .results
        .iter()
        .zip(&outcome.sources)
        .zip(descriptions)
    {
        let category = Category::coerce(result.category_id);
        println!(
            "{:>4}  {:<28}  {:<8}  {}",
            result.expenditure_id,
            format!("{} ({})", category.label(), category.id()),
            source_label(*source),
            truncate(description, 40)
        );
    }

    let stats = &outcome.stats;
    println!();
    println!(
        "{} items: {} keyword hits, {} distinct descriptions in {} model call(s), {} fallback(s)",
        stats.total, stats.keyword_hits, stats.distinct_descriptions, stats.batches, stats.fallback_items
    );

    Ok(())
}

/// Keyword tier lookup for one description
pub fn match_description(config: &Config, description: &str) -> Result<Option<Category>> {
    let matcher = config.keyword_matcher()?;
    Ok(matcher.match_description(description))
}

pub fn cmd_match(config: &Config, description: &str) -> Result<()> {
    match match_description(config, description)? {
        Some(category) => println!(
            "✓ '{}' → {} ({})",
            description,
            category.label(),
            category.id()
        ),
        None => println!(
            "✗ No keyword match for '{}' (it would be sent to the model)",
            description
        ),
    }
    Ok(())
}

fn source_label(source: DecisionSource) -> &'static str {
    match source {
        DecisionSource::Keyword => "keyword",
        DecisionSource::Model => "model",
        DecisionSource::Fallback => "fallback",
    }
}
