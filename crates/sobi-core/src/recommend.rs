//! Savings product recommendation

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::ai::{CompletionRequest, LlmBackend, LlmClient};
use crate::category::Category;
use crate::config::{Config, ProviderErrorPolicy, TaskType};
use crate::error::Result;
use crate::models::{SavingsProduct, UserProfile};
use crate::prompts::{Prompt, PromptId, PromptLibrary};
use crate::validate::{validate_recommendations, FallbackReason, Validated};

/// Ranks caller-supplied savings products for a user
#[derive(Clone)]
pub struct RecommendationRanker {
    client: LlmClient,
    prompt: Arc<Prompt>,
    model: String,
    on_provider_error: ProviderErrorPolicy,
}

impl RecommendationRanker {
    pub fn new(client: LlmClient, prompt: Prompt, model: impl Into<String>) -> Self {
        Self {
            client,
            prompt: Arc::new(prompt),
            model: model.into(),
            on_provider_error: ProviderErrorPolicy::Propagate,
        }
    }

    pub fn from_config(
        client: LlmClient,
        config: &Config,
        prompts: &mut PromptLibrary,
    ) -> Result<Self> {
        let prompt = prompts.get(PromptId::RecommendSavings)?.clone();
        Ok(Self {
            on_provider_error: config.pipeline.on_provider_error,
            ..Self::new(client, prompt, config.models.for_task(TaskType::Recommendation))
        })
    }

    pub fn with_provider_error_policy(mut self, policy: ProviderErrorPolicy) -> Self {
        self.on_provider_error = policy;
        self
    }

    /// Pick up to three products, best first
    ///
    /// Products sharing a code keep their first occurrence. With no
    /// candidates the result is empty and the model is not called.
    pub async fn recommend(
        &self,
        products: &[SavingsProduct],
        profile: &UserProfile,
    ) -> Result<Validated<Vec<SavingsProduct>>> {
        let candidates = unique_by_code(products);
        if candidates.is_empty() {
            return Ok(Validated::Ok(Vec::new()));
        }
        let codes: Vec<String> = candidates.iter().map(|p| p.product_code.clone()).collect();

        let request = self.build_request(&candidates, profile);
        let validated = match self.client.complete(&request).await {
            Ok(raw) => {
                debug!(raw = %crate::ai::parsing::preview(&raw), "Recommendation reply");
                validate_recommendations(&raw, &codes)
            }
            Err(e)
                if e.is_provider_failure()
                    && self.on_provider_error == ProviderErrorPolicy::Fallback =>
            {
                warn!(error = %e, "Recommendation call failed, using candidate order");
                let padded = validate_recommendations("", &codes).into_value();
                Validated::Fallback {
                    value: padded,
                    reason: FallbackReason::ProviderFailure(e.to_string()),
                }
            }
            Err(e) => return Err(e),
        };

        match validated.reason() {
            Some(reason) => warn!(%reason, "Recommendation padded from candidate order"),
            None => info!(codes = ?validated.value(), candidates = codes.len(), "Savings products ranked"),
        }

        let by_code: HashMap<&str, &SavingsProduct> = candidates
            .iter()
            .map(|p| (p.product_code.as_str(), *p))
            .collect();
        Ok(validated.map(|codes| {
            codes
                .iter()
                .filter_map(|c| by_code.get(c.as_str()).map(|p| (*p).clone()))
                .collect()
        }))
    }

    fn build_request(&self, candidates: &[&SavingsProduct], profile: &UserProfile) -> CompletionRequest {
        let profile_text = render_profile(profile);
        let overspending = profile
            .overspending_categories
            .iter()
            .filter_map(|id| Category::from_id(*id))
            .map(|c| format!("{}({})", c.label(), c.id()))
            .collect::<Vec<_>>()
            .join(", ");
        let products = candidates
            .iter()
            .map(|p| render_product(p))
            .collect::<Vec<_>>()
            .join("\n");

        let vars: HashMap<&str, &str> = HashMap::from([
            ("profile", profile_text.as_str()),
            ("overspending", overspending.as_str()),
            ("products", products.as_str()),
        ]);

        let mut request = CompletionRequest::new(TaskType::Recommendation, &self.model);
        if let Some(system) = self.prompt.render_system(&vars) {
            request = request.system(system);
        }
        request.user(self.prompt.render_user(&vars))
    }
}

fn unique_by_code(products: &[SavingsProduct]) -> Vec<&SavingsProduct> {
    let mut seen = HashSet::new();
    products
        .iter()
        .filter(|p| seen.insert(p.product_code.as_str()))
        .collect()
}

fn render_profile(profile: &UserProfile) -> String {
    let mut lines = Vec::new();
    if let Some(age) = profile.age {
        lines.push(format!("- age: {}", age));
    }
    if let Some(ref occupation) = profile.occupation {
        lines.push(format!("- occupation: {}", occupation));
    }
    if let Some(amount) = profile.monthly_saving_amount {
        lines.push(format!("- monthly saving amount: {} KRW", amount));
    }
    if let Some(months) = profile.saving_period_months {
        lines.push(format!("- saving period: {} months", months));
    }
    if let Some(ref notes) = profile.notes {
        lines.push(format!("- notes: {}", notes));
    }
    if lines.is_empty() {
        "- (no profile information)".to_string()
    } else {
        lines.join("\n")
    }
}

fn render_product(p: &SavingsProduct) -> String {
    let mut line = format!(
        "- {} | {} | {} | base {:.2}% | max {:.2}%",
        p.product_code,
        p.provider_name,
        p.product_name,
        p.base_rate,
        p.max_rate()
    );
    if !p.special_condition.is_empty() {
        line.push_str(&format!(" | conditions: {}", p.special_condition));
    }
    if !p.eligibility.is_empty() {
        line.push_str(&format!(" | eligibility: {}", p.eligibility));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockBackend;

    fn product(code: &str) -> SavingsProduct {
        SavingsProduct {
            product_code: code.to_string(),
            provider_name: "은행".to_string(),
            product_name: format!("{} 적금", code),
            special_condition: String::new(),
            eligibility: String::new(),
            base_rate: 3.0,
            bonus_rate: 1.0,
        }
    }

    fn ranker(mock: &MockBackend) -> RecommendationRanker {
        let prompt = PromptLibrary::embedded_only()
            .get(PromptId::RecommendSavings)
            .unwrap()
            .clone();
        RecommendationRanker::new(mock.clone().into(), prompt, "gpt-4o")
    }

    fn codes(v: &Validated<Vec<SavingsProduct>>) -> Vec<&str> {
        v.value().iter().map(|p| p.product_code.as_str()).collect()
    }

    #[tokio::test]
    async fn test_empty_candidates_skip_model() {
        let mock = MockBackend::with_reply("A");
        let out = ranker(&mock).recommend(&[], &UserProfile::default()).await.unwrap();
        assert!(out.value().is_empty());
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_model_order_kept() {
        let mock = MockBackend::with_reply("C, A, D");
        let products: Vec<_> = ["A", "B", "C", "D"].into_iter().map(product).collect();
        let out = ranker(&mock)
            .recommend(&products, &UserProfile::default())
            .await
            .unwrap();
        assert!(!out.is_fallback());
        assert_eq!(codes(&out), vec!["C", "A", "D"]);
    }

    #[tokio::test]
    async fn test_padding_and_duplicate_candidates() {
        let mock = MockBackend::with_reply("B, X");
        let mut products: Vec<_> = ["A", "B", "C"].into_iter().map(product).collect();
        let mut dup = product("A");
        dup.product_name = "second A".into();
        products.push(dup);

        let out = ranker(&mock)
            .recommend(&products, &UserProfile::default())
            .await
            .unwrap();
        assert!(out.is_fallback());
        assert_eq!(codes(&out), vec!["B", "A", "C"]);
        // First occurrence of a repeated code wins
        assert_eq!(out.value()[1].product_name, "A 적금");
    }

    #[tokio::test]
    async fn test_prompt_contents() {
        let mock = MockBackend::with_reply("A");
        let mut p = product("A");
        p.special_condition = "급여이체".into();
        let profile = UserProfile {
            age: Some(27),
            monthly_saving_amount: Some(300_000),
            overspending_categories: vec![2, 5],
            ..Default::default()
        };
        ranker(&mock).recommend(&[p], &profile).await.unwrap();

        let text = mock.requests()[0].user_text();
        assert!(text.contains("- age: 27"));
        assert!(text.contains("300000 KRW"));
        assert!(text.contains("카페/간식(2), 쇼핑(5)"));
        assert!(text.contains("conditions: 급여이체"));
        assert!(text.contains("max 4.00%"));
    }

    #[tokio::test]
    async fn test_empty_profile_and_no_overspending() {
        let mock = MockBackend::with_reply("A");
        ranker(&mock)
            .recommend(&[product("A")], &UserProfile::default())
            .await
            .unwrap();
        let text = mock.requests()[0].user_text();
        assert!(text.contains("(no profile information)"));
        assert!(!text.contains("overspend"));
    }

    #[tokio::test]
    async fn test_provider_failure_policy() {
        let mock = MockBackend::failing("timeout");
        let products: Vec<_> = ["A", "B"].into_iter().map(product).collect();

        let err = ranker(&mock)
            .recommend(&products, &UserProfile::default())
            .await
            .unwrap_err();
        assert!(err.is_provider_failure());

        let out = ranker(&mock)
            .with_provider_error_policy(ProviderErrorPolicy::Fallback)
            .recommend(&products, &UserProfile::default())
            .await
            .unwrap();
        assert_eq!(codes(&out), vec!["A", "B"]);
        assert!(matches!(out.reason(), Some(FallbackReason::ProviderFailure(_))));
    }
}
