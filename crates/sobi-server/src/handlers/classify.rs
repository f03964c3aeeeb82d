//! Expenditure classification handlers

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;

use super::ListBody;
use crate::{AppError, AppState};
use sobi_core::models::{ClassificationResult, Expenditure};

/// Classification response
#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub results: Vec<ClassificationResult>,
}

/// POST /classify (and /classify_batch) - Assign a category to every expenditure
pub async fn classify(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ListBody<Expenditure>>,
) -> Result<Json<ClassifyResponse>, AppError> {
    let items = body.into_items();
    let outcome = state.pipeline.classify_with_stats(&items).await?;

    info!(
        total = outcome.stats.total,
        keyword_hits = outcome.stats.keyword_hits,
        batches = outcome.stats.batches,
        fallback_items = outcome.stats.fallback_items,
        "Classified expenditures"
    );

    Ok(Json(ClassifyResponse {
        results: outcome.results,
    }))
}
