//! Deterministic keyword tier of the classifier
//!
//! An ordered list of `(category, keywords)` rules. A description is tested
//! against each rule in order with a plain, case-sensitive substring check and
//! the first category with a hit wins. Order is therefore part of the table:
//! `쿠팡이츠` (delivery) must be seen before `쿠팡` (shopping), and `이마트24`
//! (convenience store) before `이마트` (living).

use serde::{Deserialize, Serialize};

use crate::category::{Category, CategoryId};
use crate::error::{Error, Result};
use crate::models::Expenditure;

/// Default rule table, in declared category order
const DEFAULT_RULES: &[(Category, &[&str])] = &[
    (
        Category::DeliveryFood,
        &["배달의민족", "우아한형제들", "요기요", "쿠팡이츠", "땡겨요"],
    ),
    (
        Category::CafeSnack,
        &[
            "스타벅스",
            "투썸플레이스",
            "이디야",
            "메가커피",
            "메가엠지씨",
            "빽다방",
            "컴포즈커피",
            "할리스",
            "폴바셋",
            "커피빈",
            "파리바게뜨",
            "뚜레쥬르",
            "배스킨라빈스",
            "던킨",
            "설빙",
        ],
    ),
    (
        Category::ConvenienceStore,
        &["GS25", "씨유", "CU편의점", "세븐일레븐", "이마트24", "미니스톱"],
    ),
    (Category::Taxi, &["카카오T", "카카오택시", "택시", "우티", "TADA"]),
    (
        Category::Shopping,
        &[
            "쿠팡",
            "무신사",
            "11번가",
            "지마켓",
            "G마켓",
            "옥션",
            "올리브영",
            "SSG.COM",
            "29CM",
            "에이블리",
            "지그재그",
            "네이버페이",
        ],
    ),
    (
        Category::AlcoholEntertainment,
        &["노래방", "코인노래", "PC방", "포차", "호프", "주점", "이자카야", "와인바"],
    ),
    (
        Category::Culture,
        &["CGV", "메가박스", "롯데시네마", "인터파크", "티켓링크", "멜론티켓", "예스24티켓"],
    ),
    (
        Category::Dining,
        &["김밥", "맥도날드", "버거킹", "롯데리아", "서브웨이", "한솥", "본죽", "식당"],
    ),
    (
        Category::Medical,
        &["병원", "의원", "약국", "치과", "한의원"],
    ),
    (
        Category::Living,
        &["이마트", "홈플러스", "롯데마트", "코스트코", "다이소", "관리비", "한국전력", "도시가스"],
    ),
    (
        Category::PublicTransit,
        &["지하철", "버스", "티머니", "코레일", "SRT", "캐시비"],
    ),
];

/// One rule as written in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRuleConfig {
    pub category: CategoryId,
    pub keywords: Vec<String>,
}

/// A validated rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRule {
    pub category: Category,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    fn matches(&self, description: &str) -> bool {
        self.keywords.iter().any(|k| description.contains(k.as_str()))
    }
}

/// Items split by whether the keyword tier could decide them
///
/// Both halves hold positions into the original slice, in input order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Partition {
    pub decided: Vec<(usize, Category)>,
    pub undecided: Vec<usize>,
}

/// Ordered keyword rule table
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    rules: Vec<KeywordRule>,
}

impl KeywordMatcher {
    /// Matcher over the built-in table
    pub fn new() -> Self {
        let rules = DEFAULT_RULES
            .iter()
            .map(|(category, keywords)| KeywordRule {
                category: *category,
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
            })
            .collect();
        Self { rules }
    }

    /// Build a matcher from configured rules, keeping their order
    ///
    /// Rejects unknown category ids and empty keywords (an empty substring
    /// would match every description).
    pub fn from_config(rules: &[KeywordRuleConfig]) -> Result<Self> {
        let mut validated = Vec::with_capacity(rules.len());
        for (idx, rule) in rules.iter().enumerate() {
            let category = Category::from_id(rule.category).ok_or_else(|| {
                Error::Config(format!(
                    "keyword rule #{} uses unknown category {}",
                    idx + 1,
                    rule.category
                ))
            })?;
            if rule.keywords.iter().any(|k| k.is_empty()) {
                return Err(Error::Config(format!(
                    "keyword rule #{} ({}) contains an empty keyword",
                    idx + 1,
                    category
                )));
            }
            validated.push(KeywordRule {
                category,
                keywords: rule.keywords.clone(),
            });
        }
        Ok(Self { rules: validated })
    }

    /// First category whose keywords occur in the description
    pub fn match_description(&self, description: &str) -> Option<Category> {
        self.rules
            .iter()
            .find(|rule| rule.matches(description))
            .map(|rule| rule.category)
    }

    /// Split items into keyword-decided and undecided positions
    pub fn partition(&self, items: &[Expenditure]) -> Partition {
        let mut partition = Partition::default();
        for (pos, item) in items.iter().enumerate() {
            match self.match_description(&item.description) {
                Some(category) => partition.decided.push((pos, category)),
                None => partition.undecided.push(pos),
            }
        }
        partition
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }
}

impl Default for KeywordMatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cafe_chain_matches() {
        let matcher = KeywordMatcher::new();
        assert_eq!(
            matcher.match_description("스타벅스 아메리카노"),
            Some(Category::CafeSnack)
        );
    }

    #[test]
    fn test_no_match() {
        let matcher = KeywordMatcher::new();
        assert_eq!(matcher.match_description("알수없는상점"), None);
        assert_eq!(matcher.match_description(""), None);
    }

    #[test]
    fn test_earlier_category_wins() {
        let matcher = KeywordMatcher::new();
        // "쿠팡이츠" contains the shopping keyword "쿠팡" as well
        assert_eq!(
            matcher.match_description("쿠팡이츠 주문"),
            Some(Category::DeliveryFood)
        );
        assert_eq!(matcher.match_description("쿠팡 로켓배송"), Some(Category::Shopping));
        assert_eq!(
            matcher.match_description("이마트24 역삼점"),
            Some(Category::ConvenienceStore)
        );
        assert_eq!(matcher.match_description("이마트 성수점"), Some(Category::Living));
    }

    #[test]
    fn test_keywords_from_two_categories_pick_first_declared() {
        let matcher = KeywordMatcher::new();
        // Culture (7) is declared before Living (10)
        assert_eq!(
            matcher.match_description("CGV 홈플러스점"),
            Some(Category::Culture)
        );
    }

    #[test]
    fn test_case_sensitive() {
        let matcher = KeywordMatcher::new();
        assert_eq!(matcher.match_description("GS25 강남점"), Some(Category::ConvenienceStore));
        assert_eq!(matcher.match_description("gs25 강남점"), None);
    }

    #[test]
    fn test_partition_preserves_order() {
        let matcher = KeywordMatcher::new();
        let items = vec![
            Expenditure::new(10, "알수없는상점"),
            Expenditure::new(11, "스타벅스"),
            Expenditure::new(12, "뭔가"),
            Expenditure::new(13, "지하철 1호선"),
        ];
        let partition = matcher.partition(&items);
        assert_eq!(
            partition.decided,
            vec![(1, Category::CafeSnack), (3, Category::PublicTransit)]
        );
        assert_eq!(partition.undecided, vec![0, 2]);
    }

    #[test]
    fn test_from_config_keeps_order() {
        let rules = vec![
            KeywordRuleConfig {
                category: 10,
                keywords: vec!["마트".into()],
            },
            KeywordRuleConfig {
                category: 3,
                keywords: vec!["이마트24".into()],
            },
        ];
        let matcher = KeywordMatcher::from_config(&rules).unwrap();
        // Reversed order means the broader living rule now wins
        assert_eq!(matcher.match_description("이마트24"), Some(Category::Living));
        assert_eq!(matcher.rules()[0].category, Category::Living);
    }

    #[test]
    fn test_from_config_rejects_unknown_category() {
        let rules = vec![KeywordRuleConfig {
            category: 42,
            keywords: vec!["x".into()],
        }];
        let err = KeywordMatcher::from_config(&rules).unwrap_err();
        assert!(err.to_string().contains("unknown category 42"));
    }

    #[test]
    fn test_from_config_rejects_empty_keyword() {
        let rules = vec![KeywordRuleConfig {
            category: 2,
            keywords: vec!["스타벅스".into(), String::new()],
        }];
        assert!(KeywordMatcher::from_config(&rules).is_err());
    }

    #[test]
    fn test_default_table_never_uses_sentinel() {
        let matcher = KeywordMatcher::new();
        assert!(matcher
            .rules()
            .iter()
            .all(|r| r.category != Category::SENTINEL && !r.keywords.is_empty()));
    }
}
