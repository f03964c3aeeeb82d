//! Savings recommendation handler

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState};
use sobi_core::models::{SavingsProduct, UserProfile};

/// Recommendation request
#[derive(Debug, Deserialize)]
pub struct RecommendRequest {
    pub products: Vec<SavingsProduct>,
    #[serde(default)]
    pub profile: UserProfile,
}

/// Recommendation response
#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub recommendations: Vec<SavingsProduct>,
}

/// POST /recommend-savings - Pick up to three savings products for a user
pub async fn recommend_savings(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecommendRequest>,
) -> Result<Json<RecommendResponse>, AppError> {
    if req.products.iter().any(|p| p.product_code.trim().is_empty()) {
        return Err(AppError::bad_request("product_code must not be empty"));
    }

    let picked = state
        .recommender
        .recommend(&req.products, &req.profile)
        .await?;

    Ok(Json(RecommendResponse {
        recommendations: picked.into_value(),
    }))
}
