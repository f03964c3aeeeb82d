//! Overspending analysis handler

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;

use super::ListBody;
use crate::{AppError, AppState};
use sobi_core::{models::AnalyticsPoint, CategoryId};

/// Overspending response: three luxury category ids, most overspent first
#[derive(Debug, Serialize)]
pub struct AnalysisResponse {
    pub results: [CategoryId; 3],
}

/// POST /analysis - Rank the top overspending categories
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ListBody<AnalyticsPoint>>,
) -> Result<Json<AnalysisResponse>, AppError> {
    let points = body.into_items();
    let ranked = state.analytics.rank(&points).await?;

    info!(
        points = points.len(),
        results = ?ranked.value(),
        fallback = ranked.is_fallback(),
        "Overspending analyzed"
    );

    Ok(Json(AnalysisResponse {
        results: ranked.into_value(),
    }))
}
