//! Overspending analysis command

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use sobi_core::{models::AnalyticsPoint, AnalyticsRanker, Category, Config, SpendingSummary};

use super::{build_client, prompt_library, read_json_file};

/// Analytics input, bare or wrapped as `{"exps": [...]}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PointsFile {
    Bare(Vec<AnalyticsPoint>),
    Wrapped { exps: Vec<AnalyticsPoint> },
}

/// Load analytics points from a JSON file
pub fn read_points(path: &Path) -> Result<Vec<AnalyticsPoint>> {
    let file: PointsFile = read_json_file(path)?;
    Ok(match file {
        PointsFile::Bare(points) | PointsFile::Wrapped { exps: points } => points,
    })
}

pub async fn cmd_analyze(config: &Config, file: &Path) -> Result<()> {
    let points = read_points(file)?;
    let summary = SpendingSummary::from_points(&points);

    println!("Spending summary ({} records):\n", summary.count);
    println!("{}", summary.render_table());
    if let Some(period) = summary.period() {
        println!("Period: {}", period);
    }
    println!();

    let ranker = AnalyticsRanker::from_config(build_client(config)?, config, &mut prompt_library(config))?;
    let ranked = ranker.rank(&points).await.context("Overspending analysis failed")?;

    println!("Top overspending categories:");
    for (rank, id) in ranked.value().iter().enumerate() {
        let label = Category::from_id(*id).map(|c| c.label()).unwrap_or("?");
        println!("  {}. {} ({})", rank + 1, label, id);
    }
    if let Some(reason) = ranked.reason() {
        println!();
        println!("⚠️  Default ranking used: {}", reason);
    }

    Ok(())
}
