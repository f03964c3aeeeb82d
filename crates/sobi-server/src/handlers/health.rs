//! Service health and category listing

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use sobi_core::{Category, CategoryInfo, LlmBackend, TaskType, CATEGORY_SET_VERSION};

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: &'static str,
    pub model: String,
    pub llm_reachable: bool,
}

/// GET /health - Service status and LLM reachability
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let llm_reachable = state.client.health_check().await;

    Json(HealthResponse {
        status: "ok",
        backend: state.client.name(),
        model: state
            .config
            .models
            .for_task(TaskType::Classification)
            .to_string(),
        llm_reachable,
    })
}

/// Category listing response
#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub version: u32,
    pub categories: Vec<CategoryInfo>,
}

/// GET /categories - The category enumeration
pub async fn list_categories() -> Json<CategoriesResponse> {
    Json(CategoriesResponse {
        version: CATEGORY_SET_VERSION,
        categories: Category::all().iter().map(|c| CategoryInfo::from(*c)).collect(),
    })
}
