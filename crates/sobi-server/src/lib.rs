//! Sobi Web Server
//!
//! Axum-based REST API for expenditure classification, overspending analysis
//! and savings product recommendation.
//!
//! Security features:
//! - Restrictive CORS policy (same-origin unless origins are configured)
//! - Request body size limit
//! - Sanitized error responses

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use sobi_core::{
    AnalyticsRanker, ClassificationPipeline, Config, LlmBackend, LlmClient, PromptLibrary,
    RecommendationRanker, TaskType,
};

mod handlers;

/// Maximum request body size (2 MiB)
pub const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

/// Server configuration
#[derive(Clone)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
    /// Maximum accepted request body in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![],
            max_body_size: MAX_BODY_SIZE,
        }
    }
}

impl From<&Config> for ServerConfig {
    fn from(config: &Config) -> Self {
        Self {
            allowed_origins: config.server.allowed_origins.clone(),
            ..Default::default()
        }
    }
}

/// Shared application state
pub struct AppState {
    pub config: Config,
    pub client: LlmClient,
    pub pipeline: ClassificationPipeline,
    pub analytics: AnalyticsRanker,
    pub recommender: RecommendationRanker,
}

impl AppState {
    /// Build the state with the LLM client the config describes
    pub fn from_config(config: Config) -> sobi_core::Result<Self> {
        let client = LlmClient::from_config(&config.llm)?;
        Self::with_client(config, client)
    }

    /// Build the state around an existing client (tests use a mock)
    pub fn with_client(config: Config, client: LlmClient) -> sobi_core::Result<Self> {
        let mut prompts = PromptLibrary::from_override(config.prompt_override_dir.clone());
        let pipeline = ClassificationPipeline::from_config(client.clone(), &config, &mut prompts)?;
        let analytics = AnalyticsRanker::from_config(client.clone(), &config, &mut prompts)?;
        let recommender = RecommendationRanker::from_config(client.clone(), &config, &mut prompts)?;

        Ok(Self {
            config,
            client,
            pipeline,
            analytics,
            recommender,
        })
    }
}

/// Create the application router
pub fn create_router(state: AppState, config: ServerConfig) -> Router {
    info!(
        "LLM backend configured: {} at {} (classification: {}, analytics: {}, recommendation: {})",
        state.client.name(),
        state.client.host(),
        state.config.models.for_task(TaskType::Classification),
        state.config.models.for_task(TaskType::Analytics),
        state.config.models.for_task(TaskType::Recommendation),
    );

    let state = Arc::new(state);

    let routes = Router::new()
        // Classification
        .route("/classify", post(handlers::classify))
        .route("/classify_batch", post(handlers::classify))
        // Analysis
        .route("/analysis", post(handlers::analyze))
        // Recommendation
        .route("/recommend-savings", post(handlers::recommend_savings))
        // Service info
        .route("/health", get(handlers::health))
        .route("/categories", get(handlers::list_categories));

    routes
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(config.max_body_size))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.allowed_origins))
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Same-origin only unless origins are listed; unparsable origins are skipped
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);
    if allowed_origins.is_empty() {
        return layer;
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
    layer.allow_origin(origins)
}

/// Start the server on the host and port from `[server]`
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let host = config.server.host.clone();
    let port = config.server.port;
    serve_with_config(config, &host, port).await
}

/// Start the server on an explicit address
pub async fn serve_with_config(config: Config, host: &str, port: u16) -> anyhow::Result<()> {
    let server_config = ServerConfig::from(&config);
    let state = AppState::from_config(config)?;

    check_ai_connection(&state.client).await;

    let app = create_router(state, server_config);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Check and log LLM backend connection status
async fn check_ai_connection(client: &LlmClient) {
    if client.health_check().await {
        info!("✅ LLM backend connected: {} ({})", client.host(), client.name());
    } else {
        warn!(
            "⚠️  LLM backend configured but not responding: {} ({})",
            client.host(),
            client.name()
        );
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn bad_request(msg: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %err, "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl From<sobi_core::Error> for AppError {
    fn from(err: sobi_core::Error) -> Self {
        if err.is_provider_failure() {
            warn!(error = %err, "LLM provider failed");
            return Self {
                status: StatusCode::BAD_GATEWAY,
                message: "LLM provider request failed".to_string(),
                internal: Some(err.into()),
            };
        }
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err.into()),
        }
    }
}
