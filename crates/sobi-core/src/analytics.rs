//! Overspending analysis
//!
//! Categorized spending is aggregated per category and handed to the model,
//! which picks the three discretionary categories the user overspends on.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::ai::{CompletionRequest, LlmBackend, LlmClient, ResponseFormat};
use crate::category::{Category, CategoryId};
use crate::config::{Config, ProviderErrorPolicy, TaskType};
use crate::error::Result;
use crate::models::AnalyticsPoint;
use crate::prompts::{Prompt, PromptId, PromptLibrary};
use crate::validate::{validate_overspending, FallbackReason, Validated};

/// Spending in one category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpend {
    pub category_id: CategoryId,
    pub label: &'static str,
    pub total: i64,
    pub count: usize,
    /// Fraction of overall spending, 0.0 when the overall total is not positive
    pub share: f64,
    pub luxury: bool,
}

/// Per-category aggregate of a user's spending
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpendingSummary {
    pub categories: BTreeMap<CategoryId, CategorySpend>,
    pub total: i64,
    pub count: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

impl SpendingSummary {
    /// Aggregate points; ids outside the enumeration count as the sentinel
    pub fn from_points(points: &[AnalyticsPoint]) -> Self {
        let mut summary = Self::default();

        for point in points {
            let category = Category::coerce(point.category_id);
            let entry = summary
                .categories
                .entry(category.id())
                .or_insert_with(|| CategorySpend {
                    category_id: category.id(),
                    label: category.label(),
                    total: 0,
                    count: 0,
                    share: 0.0,
                    luxury: category.is_luxury(),
                });
            entry.total = entry.total.saturating_add(point.amount);
            entry.count += 1;

            summary.total = summary.total.saturating_add(point.amount);
            summary.count += 1;

            if let Some(date) = point.date {
                summary.first_date = Some(summary.first_date.map_or(date, |d| d.min(date)));
                summary.last_date = Some(summary.last_date.map_or(date, |d| d.max(date)));
            }
        }

        if summary.total > 0 {
            for spend in summary.categories.values_mut() {
                spend.share = spend.total as f64 / summary.total as f64;
            }
        }
        summary
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Observed date range, e.g. `2025-07-01 ~ 2025-07-31`
    pub fn period(&self) -> Option<String> {
        match (self.first_date, self.last_date) {
            (Some(first), Some(last)) => Some(format!("{} ~ {}", first, last)),
            _ => None,
        }
    }

    /// One line per category, in id order
    pub fn render_table(&self) -> String {
        self.categories
            .values()
            .map(|c| {
                format!(
                    "- {} {}: {} KRW, {} transactions, {:.1}%",
                    c.category_id,
                    c.label,
                    c.total,
                    c.count,
                    c.share * 100.0
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Strict schema for the structured reply: exactly three luxury ids
pub fn overspending_schema() -> serde_json::Value {
    let ids: Vec<CategoryId> = Category::LUXURY_RANGE.collect();
    json!({
        "type": "object",
        "properties": {
            "results": {
                "type": "array",
                "items": {"type": "integer", "enum": ids},
                "minItems": 3,
                "maxItems": 3
            }
        },
        "required": ["results"],
        "additionalProperties": false
    })
}

/// Picks the top three overspending categories
#[derive(Clone)]
pub struct AnalyticsRanker {
    client: LlmClient,
    prompt: Arc<Prompt>,
    model: String,
    structured_output: bool,
    on_provider_error: ProviderErrorPolicy,
}

impl AnalyticsRanker {
    pub fn new(client: LlmClient, prompt: Prompt, model: impl Into<String>) -> Self {
        Self {
            client,
            prompt: Arc::new(prompt),
            model: model.into(),
            structured_output: true,
            on_provider_error: ProviderErrorPolicy::Propagate,
        }
    }

    pub fn from_config(
        client: LlmClient,
        config: &Config,
        prompts: &mut PromptLibrary,
    ) -> Result<Self> {
        let prompt = prompts.get(PromptId::RankOverspending)?.clone();
        Ok(Self {
            structured_output: config.analytics.structured_output,
            on_provider_error: config.pipeline.on_provider_error,
            ..Self::new(client, prompt, config.models.for_task(TaskType::Analytics))
        })
    }

    pub fn with_structured_output(mut self, structured: bool) -> Self {
        self.structured_output = structured;
        self
    }

    pub fn with_provider_error_policy(mut self, policy: ProviderErrorPolicy) -> Self {
        self.on_provider_error = policy;
        self
    }

    /// Rank overspending categories; empty input yields the default triple
    /// without a model call
    pub async fn rank(&self, points: &[AnalyticsPoint]) -> Result<Validated<[CategoryId; 3]>> {
        let summary = SpendingSummary::from_points(points);
        if summary.is_empty() {
            return Ok(Validated::Fallback {
                value: Category::DEFAULT_OVERSPENDING,
                reason: FallbackReason::Insufficient {
                    found: 0,
                    required: 3,
                },
            });
        }

        let request = self.build_request(&summary);
        let raw = match self.client.complete(&request).await {
            Ok(raw) => raw,
            Err(e)
                if e.is_provider_failure()
                    && self.on_provider_error == ProviderErrorPolicy::Fallback =>
            {
                warn!(error = %e, "Analytics call failed, using default ranking");
                return Ok(Validated::Fallback {
                    value: Category::DEFAULT_OVERSPENDING,
                    reason: FallbackReason::ProviderFailure(e.to_string()),
                });
            }
            Err(e) => return Err(e),
        };
        debug!(raw = %crate::ai::parsing::preview(&raw), "Analytics reply");

        let ranked = validate_overspending(&raw);
        match ranked.reason() {
            Some(reason) => warn!(%reason, "Overspending ranking fell back to default"),
            None => info!(results = ?ranked.value(), points = summary.count, "Overspending ranked"),
        }
        Ok(ranked)
    }

    fn build_request(&self, summary: &SpendingSummary) -> CompletionRequest {
        let table = summary.render_table();
        let total = summary.total.to_string();
        let count = summary.count.to_string();
        let period = summary.period().unwrap_or_default();
        let luxury = Category::luxury_prompt_table();
        let mode = if self.structured_output { "structured" } else { "plain" };

        let vars: HashMap<&str, &str> = HashMap::from([
            ("summary", table.as_str()),
            ("total", total.as_str()),
            ("count", count.as_str()),
            ("period", period.as_str()),
            ("luxury_categories", luxury.as_str()),
            (mode, "yes"),
        ]);

        let format = if self.structured_output {
            ResponseFormat::JsonSchema {
                name: "overspending_categories".into(),
                schema: overspending_schema(),
            }
        } else {
            ResponseFormat::Text
        };

        let mut request = CompletionRequest::new(TaskType::Analytics, &self.model)
            .response_format(format);
        if let Some(system) = self.prompt.render_system(&vars) {
            request = request.system(system);
        }
        request.user(self.prompt.render_user(&vars))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;

    fn point(category_id: CategoryId, amount: i64, date: Option<&str>) -> AnalyticsPoint {
        AnalyticsPoint {
            category_id,
            amount,
            date: date.map(|d| d.parse().unwrap()),
        }
    }

    fn ranker(mock: &MockBackend) -> AnalyticsRanker {
        let prompt = PromptLibrary::embedded_only()
            .get(PromptId::RankOverspending)
            .unwrap()
            .clone();
        AnalyticsRanker::new(mock.clone().into(), prompt, "gpt-4o")
    }

    #[test]
    fn test_summary_aggregation() {
        let summary = SpendingSummary::from_points(&[
            point(2, 4_500, Some("2025-07-03")),
            point(2, 5_500, Some("2025-07-01")),
            point(5, 30_000, None),
            point(99, 10_000, Some("2025-07-20")),
        ]);

        assert_eq!(summary.total, 50_000);
        assert_eq!(summary.count, 4);
        assert_eq!(summary.categories.len(), 3);

        let cafe = &summary.categories[&2];
        assert_eq!(cafe.total, 10_000);
        assert_eq!(cafe.count, 2);
        assert!((cafe.share - 0.2).abs() < 1e-9);
        assert!(cafe.luxury);

        // Unknown id folded into the sentinel
        assert_eq!(summary.categories[&12].total, 10_000);
        assert!(!summary.categories[&12].luxury);

        assert_eq!(summary.period().as_deref(), Some("2025-07-01 ~ 2025-07-20"));
    }

    #[test]
    fn test_summary_table_is_ordered_by_id() {
        let summary = SpendingSummary::from_points(&[point(7, 1, None), point(1, 1, None)]);
        let table = summary.render_table();
        let first = table.lines().next().unwrap();
        assert!(first.starts_with("- 1 배달음식"));
    }

    #[test]
    fn test_summary_non_positive_total_has_zero_shares() {
        let summary = SpendingSummary::from_points(&[point(1, 100, None), point(2, -100, None)]);
        assert_eq!(summary.total, 0);
        assert!(summary.categories.values().all(|c| c.share == 0.0));
    }

    #[test]
    fn test_schema_restricts_to_luxury_range() {
        let schema = overspending_schema();
        let ids = schema["properties"]["results"]["items"]["enum"].as_array().unwrap();
        assert_eq!(ids.len(), 7);
        assert_eq!(schema["properties"]["results"]["minItems"], 3);
    }

    #[tokio::test]
    async fn test_empty_input_skips_model() {
        let mock = MockBackend::with_reply("2, 5, 6");
        let ranked = ranker(&mock).rank(&[]).await.unwrap();
        assert_eq!(*ranked.value(), [1, 3, 7]);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_structured_request() {
        let mock = MockBackend::with_reply(r#"{"results": [5, 2, 6]}"#);
        let ranked = ranker(&mock)
            .rank(&[point(5, 100_000, Some("2025-07-01")), point(2, 20_000, None)])
            .await
            .unwrap();
        assert_eq!(ranked, Validated::Ok([5, 2, 6]));

        let req = &mock.requests()[0];
        assert_eq!(req.task, TaskType::Analytics);
        assert!(matches!(req.response_format, ResponseFormat::JsonSchema { .. }));
        assert!(req.user_text().contains("100000 KRW"));
        assert!(req.user_text().contains("Period: 2025-07-01 ~ 2025-07-01"));
    }

    #[tokio::test]
    async fn test_plain_text_mode() {
        let mock = MockBackend::with_reply("6, 1, 4");
        let ranked = ranker(&mock)
            .with_structured_output(false)
            .rank(&[point(6, 1, None)])
            .await
            .unwrap();
        assert_eq!(*ranked.value(), [6, 1, 4]);

        let req = &mock.requests()[0];
        assert_eq!(req.response_format, ResponseFormat::Text);
        assert!(req.messages[0].content.contains("separated by commas"));
        assert!(!req.user_text().contains("Period:"));
    }

    #[tokio::test]
    async fn test_garbage_reply_defaults() {
        let mock = MockBackend::with_reply("abc");
        let ranked = ranker(&mock).rank(&[point(1, 1, None)]).await.unwrap();
        assert!(ranked.is_fallback());
        assert_eq!(*ranked.value(), [1, 3, 7]);
    }

    #[tokio::test]
    async fn test_provider_failure_policy() {
        let mock = MockBackend::failing("503");
        let points = [point(1, 1, None)];

        assert!(ranker(&mock).rank(&points).await.is_err());

        let ranked = ranker(&mock)
            .with_provider_error_policy(ProviderErrorPolicy::Fallback)
            .rank(&points)
            .await
            .unwrap();
        assert!(matches!(ranked.reason(), Some(FallbackReason::ProviderFailure(_))));
        assert_eq!(*ranked.value(), [1, 3, 7]);
    }
}
