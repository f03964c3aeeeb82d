//! Sobi Core Library
//!
//! Shared functionality for the sobi spending-insight service:
//! - Canonical spending-category enumeration
//! - Keyword tier for deterministic classification
//! - Pluggable LLM backends (OpenAI-compatible, Ollama, mock)
//! - Prompt library with on-disk overrides
//! - Response validation with explicit fallbacks
//! - Batched, deduplicated, concurrency-bounded classification pipeline
//! - Overspending analysis and savings product recommendation
//! - Layered configuration

pub mod ai;
pub mod analytics;
pub mod category;
pub mod config;
pub mod error;
pub mod keywords;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod recommend;
pub mod validate;

/// Test utilities including a mock completion server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{CompletionRequest, LlmBackend, LlmClient, MockBackend, ResponseFormat};
pub use analytics::{AnalyticsRanker, CategorySpend, SpendingSummary};
pub use category::{Category, CategoryId, CategoryInfo, CATEGORY_SET_VERSION};
pub use config::{BackendKind, Config, ProviderErrorPolicy, TaskType};
pub use error::{Error, Result};
pub use keywords::{KeywordMatcher, KeywordRuleConfig};
pub use models::{
    AnalyticsPoint, ClassificationResult, DecisionSource, Expenditure, SavingsProduct, UserProfile,
};
pub use pipeline::{Classification, ClassificationPipeline, ClassificationStats};
pub use prompts::{Prompt, PromptId, PromptInfo, PromptLibrary};
pub use recommend::RecommendationRanker;
pub use validate::{FallbackReason, Validated};
