//! Domain models for sobi

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::category::CategoryId;

/// A single spending record awaiting classification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expenditure {
    #[serde(rename = "expenditure_id")]
    pub id: i64,
    pub description: String,
}

impl Expenditure {
    pub fn new(id: i64, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
        }
    }
}

/// Category assigned to one expenditure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub expenditure_id: i64,
    pub category_id: CategoryId,
}

/// How a classification result was decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// Matched the keyword table
    Keyword,
    /// Resolved by the model
    Model,
    /// Defaulted to the sentinel
    Fallback,
}

/// Categorized spending used for overspending analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsPoint {
    pub category_id: CategoryId,
    pub amount: i64,
    /// Older callers omit the date entirely
    #[serde(rename = "expenditure_date", default)]
    pub date: Option<NaiveDate>,
}

/// A savings product offered as a recommendation candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingsProduct {
    pub product_code: String,
    pub provider_name: String,
    pub product_name: String,
    #[serde(default)]
    pub special_condition: String,
    #[serde(default)]
    pub eligibility: String,
    pub base_rate: f64,
    #[serde(default)]
    pub bonus_rate: f64,
}

impl SavingsProduct {
    /// Best case rate when every bonus condition is met
    pub fn max_rate(&self) -> f64 {
        self.base_rate + self.bonus_rate
    }
}

/// Profile of the user asking for savings recommendations
///
/// Every field is optional; whatever is present is handed to the model as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupation: Option<String>,
    /// Amount the user can set aside each month (KRW)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_saving_amount: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saving_period_months: Option<u32>,
    /// Categories the analytics ranker flagged for this user
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overspending_categories: Vec<CategoryId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expenditure_wire_names() {
        let json = r#"{"expenditure_id": 7, "description": "스타벅스"}"#;
        let exp: Expenditure = serde_json::from_str(json).unwrap();
        assert_eq!(exp, Expenditure::new(7, "스타벅스"));

        let back = serde_json::to_value(&exp).unwrap();
        assert_eq!(back["expenditure_id"], 7);
        assert!(back.get("id").is_none());
    }

    #[test]
    fn test_analytics_point_date_optional() {
        let with_date: AnalyticsPoint = serde_json::from_str(
            r#"{"category_id": 2, "amount": 4500, "expenditure_date": "2025-07-01"}"#,
        )
        .unwrap();
        assert_eq!(with_date.date, NaiveDate::from_ymd_opt(2025, 7, 1));

        let without: AnalyticsPoint =
            serde_json::from_str(r#"{"category_id": 2, "amount": 4500}"#).unwrap();
        assert!(without.date.is_none());
    }

    #[test]
    fn test_savings_product_defaults() {
        let json = r#"{
            "product_code": "KB-01",
            "provider_name": "KB국민은행",
            "product_name": "KB 청년적금",
            "base_rate": 3.1
        }"#;
        let product: SavingsProduct = serde_json::from_str(json).unwrap();
        assert_eq!(product.bonus_rate, 0.0);
        assert!(product.special_condition.is_empty());
        assert!((product.max_rate() - 3.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_user_profile_skips_empty_fields() {
        let profile = UserProfile {
            age: Some(27),
            ..Default::default()
        };
        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json, serde_json::json!({"age": 27}));
    }
}
