//! Expenditure classification pipeline
//!
//! Keyword tier first, model second:
//!
//! 1. [`KeywordMatcher`] decides what it can.
//! 2. The rest is grouped by exact description and chunked ([`BatchDeduplicator`]).
//! 3. Batches are sent to the model concurrently, bounded by [`ConcurrencyLimiter`].
//! 4. Each reply goes through [`validate_classification_batch`].
//! 5. Answers are copied to every group member and merged back in input order.
//!
//! Output always has one result per input item, in input order.

mod dedup;
mod limiter;

pub use dedup::{Assignment, BatchDeduplicator, DedupPlan, DescriptionGroup};
pub use limiter::ConcurrencyLimiter;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::json;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::ai::{CompletionRequest, LlmBackend, LlmClient, ResponseFormat};
use crate::category::{Category, CategoryId, CATEGORY_SET_VERSION};
use crate::config::{Config, PipelineConfig, ProviderErrorPolicy, TaskType};
use crate::error::{Error, Result};
use crate::keywords::KeywordMatcher;
use crate::models::{ClassificationResult, DecisionSource, Expenditure};
use crate::prompts::{Prompt, PromptId, PromptLibrary};
use crate::validate::{validate_classification_batch, FallbackReason, Validated};

/// Counters for one classification run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassificationStats {
    pub total: usize,
    pub keyword_hits: usize,
    /// Distinct descriptions sent to the model
    pub distinct_descriptions: usize,
    pub batches: usize,
    /// Items that ended up with the sentinel because of a fallback
    pub fallback_items: usize,
}

/// Full output of a classification run
#[derive(Debug, Clone)]
pub struct Classification {
    pub results: Vec<ClassificationResult>,
    /// Parallel to `results`
    pub sources: Vec<DecisionSource>,
    pub stats: ClassificationStats,
}

/// What came back for one batch
struct BatchOutcome {
    batch: usize,
    reply: Result<String>,
    elapsed: Duration,
}

/// Keyword-first, model-fallback classifier
#[derive(Clone)]
pub struct ClassificationPipeline {
    client: LlmClient,
    matcher: Arc<KeywordMatcher>,
    prompt: Arc<Prompt>,
    model: String,
    settings: PipelineConfig,
    limiter: ConcurrencyLimiter,
}

impl ClassificationPipeline {
    pub fn new(
        client: LlmClient,
        matcher: KeywordMatcher,
        prompt: Prompt,
        model: impl Into<String>,
        settings: PipelineConfig,
    ) -> Self {
        let limiter = ConcurrencyLimiter::new(settings.max_concurrency);
        Self {
            client,
            matcher: Arc::new(matcher),
            prompt: Arc::new(prompt),
            model: model.into(),
            settings,
            limiter,
        }
    }

    /// Build from config, loading the keyword table and prompt it names
    pub fn from_config(
        client: LlmClient,
        config: &Config,
        prompts: &mut PromptLibrary,
    ) -> Result<Self> {
        let prompt = prompts.get(PromptId::ClassifyExpenditures)?.clone();
        Ok(Self::new(
            client,
            config.keyword_matcher()?,
            prompt,
            config.models.for_task(TaskType::Classification),
            config.pipeline.clone(),
        ))
    }

    pub fn matcher(&self) -> &KeywordMatcher {
        &self.matcher
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    pub fn settings(&self) -> &PipelineConfig {
        &self.settings
    }

    /// Classify items, returning one result per item in input order
    pub async fn classify(&self, items: &[Expenditure]) -> Result<Vec<ClassificationResult>> {
        Ok(self.classify_with_stats(items).await?.results)
    }

    /// Classify items and report how each result was decided
    pub async fn classify_with_stats(&self, items: &[Expenditure]) -> Result<Classification> {
        let mut stats = ClassificationStats {
            total: items.len(),
            ..Default::default()
        };
        let mut assigned: Vec<Option<(Category, DecisionSource)>> = vec![None; items.len()];

        let partition = self.matcher.partition(items);
        stats.keyword_hits = partition.decided.len();
        for (pos, category) in partition.decided {
            assigned[pos] = Some((category, DecisionSource::Keyword));
        }

        let plan = BatchDeduplicator::new(self.settings.batch_size).plan(items, &partition.undecided);
        stats.distinct_descriptions = plan.groups.len();
        stats.batches = plan.batches.len();

        if !plan.is_empty() {
            let validated = self.dispatch(&plan).await?;
            let answers: Vec<HashMap<i64, Category>> = validated
                .iter()
                .map(|v| v.value().clone())
                .collect();

            for a in plan.fan_out(&answers) {
                // Sentinel answers inside a fallback batch count as fallbacks
                let source = if validated[a.batch].is_fallback() && a.category == Category::SENTINEL {
                    DecisionSource::Fallback
                } else {
                    DecisionSource::Model
                };
                assigned[a.position] = Some((a.category, source));
            }
        }

        let mut results = Vec::with_capacity(items.len());
        let mut sources = Vec::with_capacity(items.len());
        for (item, slot) in items.iter().zip(assigned) {
            let (category, source) = slot.unwrap_or((Category::SENTINEL, DecisionSource::Fallback));
            if source == DecisionSource::Fallback {
                stats.fallback_items += 1;
            }
            results.push(ClassificationResult {
                expenditure_id: item.id,
                category_id: category.id(),
            });
            sources.push(source);
        }

        debug!(?stats, "Classification finished");
        Ok(Classification {
            results,
            sources,
            stats,
        })
    }

    /// Send every batch, bounded by the limiter, and validate the replies
    ///
    /// Returns one validated map per batch, indexed like `plan.batches`.
    async fn dispatch(&self, plan: &DedupPlan) -> Result<Vec<Validated<HashMap<i64, Category>>>> {
        let mut tasks: JoinSet<Result<BatchOutcome>> = JoinSet::new();

        for batch in 0..plan.batches.len() {
            let request = self.build_request(&plan.batch_items(batch))?;
            let client = self.client.clone();
            let limiter = self.limiter.clone();

            tasks.spawn(async move {
                let _permit = limiter.acquire().await?;
                let started = Instant::now();
                let reply = client.complete(&request).await;
                Ok(BatchOutcome {
                    batch,
                    reply,
                    elapsed: started.elapsed(),
                })
            });
        }

        let mut validated: Vec<Option<Validated<HashMap<i64, Category>>>> =
            (0..plan.batches.len()).map(|_| None).collect();

        while let Some(joined) = tasks.join_next().await {
            let outcome = joined.map_err(|e| Error::Scheduling(format!("batch task failed: {}", e)))??;
            let ids = plan.batch_ids(outcome.batch);

            let result = match outcome.reply {
                Ok(raw) => {
                    debug!(batch = outcome.batch, raw = %crate::ai::parsing::preview(&raw), "Model reply");
                    validate_classification_batch(&raw, &ids)
                }
                Err(e) if e.is_provider_failure()
                    && self.settings.on_provider_error == ProviderErrorPolicy::Fallback =>
                {
                    Validated::Fallback {
                        value: ids.iter().map(|id| (*id, Category::SENTINEL)).collect(),
                        reason: FallbackReason::ProviderFailure(e.to_string()),
                    }
                }
                Err(e) => {
                    warn!(batch = outcome.batch, error = %e, "Classification batch failed");
                    return Err(e);
                }
            };

            match result.reason() {
                Some(reason) => warn!(
                    batch = outcome.batch,
                    size = ids.len(),
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    %reason,
                    "Classification batch fell back"
                ),
                None => info!(
                    batch = outcome.batch,
                    size = ids.len(),
                    elapsed_ms = outcome.elapsed.as_millis() as u64,
                    "Classification batch done"
                ),
            }
            validated[outcome.batch] = Some(result);
        }

        validated
            .into_iter()
            .enumerate()
            .map(|(b, v)| v.ok_or_else(|| Error::Scheduling(format!("batch {} never completed", b))))
            .collect()
    }

    fn build_request(&self, batch: &[Expenditure]) -> Result<CompletionRequest> {
        let lines = batch
            .iter()
            .map(serde_json::to_string)
            .collect::<std::result::Result<Vec<_>, _>>()?
            .join("\n");
        let categories = Category::prompt_table();
        let version = CATEGORY_SET_VERSION.to_string();
        let sentinel = Category::SENTINEL.id().to_string();

        let vars: HashMap<&str, &str> = HashMap::from([
            ("expenditures", lines.as_str()),
            ("categories", categories.as_str()),
            ("category_version", version.as_str()),
            ("sentinel", sentinel.as_str()),
        ]);

        let ids: Vec<i64> = batch.iter().map(|e| e.id).collect();
        let mut request = CompletionRequest::new(TaskType::Classification, &self.model)
            .response_format(ResponseFormat::JsonSchema {
                name: "expenditure_categories".into(),
                schema: classification_schema(&ids),
            });
        if let Some(system) = self.prompt.render_system(&vars) {
            request = request.system(system);
        }
        Ok(request.user(self.prompt.render_user(&vars)))
    }
}

/// Strict reply schema for one batch
///
/// `expenditure_id` is limited to the batch's own ids and `category_id` to
/// the canonical set. Replies are still validated; providers may ignore it.
pub fn classification_schema(batch_ids: &[i64]) -> serde_json::Value {
    let categories: Vec<CategoryId> = Category::all().iter().map(Category::id).collect();
    json!({
        "type": "object",
        "properties": {
            "results": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "expenditure_id": {"type": "integer", "enum": batch_ids},
                        "category_id": {"type": "integer", "enum": categories}
                    },
                    "required": ["expenditure_id", "category_id"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["results"],
        "additionalProperties": false
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;

    fn pipeline(mock: &MockBackend, batch_size: usize) -> ClassificationPipeline {
        let prompt = PromptLibrary::embedded_only()
            .get(PromptId::ClassifyExpenditures)
            .unwrap()
            .clone();
        ClassificationPipeline::new(
            mock.clone().into(),
            KeywordMatcher::new(),
            prompt,
            "gpt-4.1-nano",
            PipelineConfig {
                batch_size,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_empty_input() {
        let mock = MockBackend::new();
        let out = pipeline(&mock, 16).classify(&[]).await.unwrap();
        assert!(out.is_empty());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_request_contents() {
        let mock = MockBackend::with_reply(r#"{"results": [{"expenditure_id": 5, "category_id": 9}]}"#);
        let out = pipeline(&mock, 16)
            .classify(&[Expenditure::new(5, "알수없는상점")])
            .await
            .unwrap();
        assert_eq!(out[0].category_id, 9);

        let req = &mock.requests()[0];
        assert_eq!(req.task, TaskType::Classification);
        assert_eq!(req.model, "gpt-4.1-nano");
        match &req.response_format {
            ResponseFormat::JsonSchema { name, schema } => {
                assert_eq!(name, "expenditure_categories");
                let item = &schema["properties"]["results"]["items"];
                assert_eq!(item["properties"]["expenditure_id"]["enum"], json!([5]));
                assert_eq!(item["properties"]["category_id"]["enum"].as_array().unwrap().len(), 12);
                assert_eq!(item["additionalProperties"], false);
            }
            other => panic!("expected a strict schema, got {:?}", other),
        }
        assert!(req.user_text().contains(r#""expenditure_id":5"#));
        assert!(req.user_text().contains("알수없는상점"));
        assert!(req.messages[0].content.contains("기타:12"));
    }

    #[tokio::test]
    async fn test_sources_and_stats() {
        let mock = MockBackend::with_reply(r#"{"results": [{"expenditure_id": 2, "category_id": 5}]}"#);
        let items = vec![
            Expenditure::new(1, "스타벅스 강남"),
            Expenditure::new(2, "가게A"),
            Expenditure::new(3, "가게B"),
            Expenditure::new(4, "가게A"),
        ];
        let out = pipeline(&mock, 16).classify_with_stats(&items).await.unwrap();

        assert_eq!(
            out.sources,
            vec![
                DecisionSource::Keyword,
                DecisionSource::Model,
                DecisionSource::Fallback,
                DecisionSource::Model
            ]
        );
        assert_eq!(
            out.stats,
            ClassificationStats {
                total: 4,
                keyword_hits: 1,
                distinct_descriptions: 2,
                batches: 1,
                fallback_items: 1,
            }
        );
    }

    #[tokio::test]
    async fn test_provider_failure_propagates_by_default() {
        let mock = MockBackend::failing("connection reset");
        let err = pipeline(&mock, 16)
            .classify(&[Expenditure::new(1, "뭔가")])
            .await
            .unwrap_err();
        assert!(err.is_provider_failure());
    }

    #[tokio::test]
    async fn test_provider_failure_fallback_policy() {
        let mock = MockBackend::failing("connection reset");
        let mut p = pipeline(&mock, 16);
        p.settings.on_provider_error = ProviderErrorPolicy::Fallback;

        let out = p
            .classify_with_stats(&[Expenditure::new(1, "뭔가"), Expenditure::new(2, "GS25")])
            .await
            .unwrap();
        assert_eq!(out.results[0].category_id, 12);
        assert_eq!(out.results[1].category_id, 3);
        assert_eq!(out.stats.fallback_items, 1);
    }

    #[tokio::test]
    async fn test_closed_limiter_is_fatal() {
        let mock = MockBackend::new();
        let p = pipeline(&mock, 16);
        p.limiter().close();
        let err = p.classify(&[Expenditure::new(1, "뭔가")]).await.unwrap_err();
        assert!(matches!(err, Error::Scheduling(_)));
        assert_eq!(mock.call_count(), 0);
    }
}
