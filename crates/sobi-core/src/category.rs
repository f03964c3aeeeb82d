//! Canonical spending-category enumeration
//!
//! Category numbering has changed between prompt revisions in the past, so the
//! numbers below are only meaningful together with [`CATEGORY_SET_VERSION`].
//! The classification prompt embeds this table verbatim so that the model and
//! the validator always agree on what a number means.

use serde::Serialize;

/// Version of the category numbering below
pub const CATEGORY_SET_VERSION: u32 = 3;

/// Integer category code as it travels on the wire
pub type CategoryId = i64;

/// Spending categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    DeliveryFood,
    CafeSnack,
    ConvenienceStore,
    Taxi,
    Shopping,
    AlcoholEntertainment,
    Culture,
    Dining,
    Medical,
    Living,
    PublicTransit,
    Other,
}

impl Category {
    /// Catch-all category substituted whenever a label cannot be determined
    pub const SENTINEL: Category = Category::Other;

    /// Discretionary ("luxury") categories eligible for overspending ranking
    pub const LUXURY_RANGE: std::ops::RangeInclusive<CategoryId> = 1..=7;

    /// Default overspending triple when the model reply is unusable
    pub const DEFAULT_OVERSPENDING: [CategoryId; 3] = [1, 3, 7];

    /// All categories in declared order
    pub fn all() -> &'static [Category] {
        &[
            Self::DeliveryFood,
            Self::CafeSnack,
            Self::ConvenienceStore,
            Self::Taxi,
            Self::Shopping,
            Self::AlcoholEntertainment,
            Self::Culture,
            Self::Dining,
            Self::Medical,
            Self::Living,
            Self::PublicTransit,
            Self::Other,
        ]
    }

    pub fn id(&self) -> CategoryId {
        match self {
            Self::DeliveryFood => 1,
            Self::CafeSnack => 2,
            Self::ConvenienceStore => 3,
            Self::Taxi => 4,
            Self::Shopping => 5,
            Self::AlcoholEntertainment => 6,
            Self::Culture => 7,
            Self::Dining => 8,
            Self::Medical => 9,
            Self::Living => 10,
            Self::PublicTransit => 11,
            Self::Other => 12,
        }
    }

    pub fn from_id(id: CategoryId) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.id() == id)
    }

    /// Map any integer onto the enumeration, substituting the sentinel
    pub fn coerce(id: CategoryId) -> Self {
        Self::from_id(id).unwrap_or(Self::SENTINEL)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DeliveryFood => "delivery_food",
            Self::CafeSnack => "cafe_snack",
            Self::ConvenienceStore => "convenience_store",
            Self::Taxi => "taxi",
            Self::Shopping => "shopping",
            Self::AlcoholEntertainment => "alcohol_entertainment",
            Self::Culture => "culture",
            Self::Dining => "dining",
            Self::Medical => "medical",
            Self::Living => "living",
            Self::PublicTransit => "public_transit",
            Self::Other => "other",
        }
    }

    /// Label used inside prompts
    pub fn label(&self) -> &'static str {
        match self {
            Self::DeliveryFood => "배달음식",
            Self::CafeSnack => "카페/간식",
            Self::ConvenienceStore => "편의점",
            Self::Taxi => "택시",
            Self::Shopping => "쇼핑",
            Self::AlcoholEntertainment => "술/유흥",
            Self::Culture => "문화(영화관, 티켓, 공연, 스포츠)",
            Self::Dining => "식비",
            Self::Medical => "의료(병원/약국)",
            Self::Living => "생활(마트/생활/주거)",
            Self::PublicTransit => "대중교통",
            Self::Other => "기타",
        }
    }

    pub fn is_luxury(&self) -> bool {
        Self::LUXURY_RANGE.contains(&self.id())
    }

    /// Whether an integer is a member of the enumeration
    pub fn is_valid_id(id: CategoryId) -> bool {
        Self::from_id(id).is_some()
    }

    /// Render the enumeration as `label:id` pairs for prompts
    pub fn prompt_table() -> String {
        Self::all()
            .iter()
            .map(|c| format!("{}:{}", c.label(), c.id()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Render only the luxury categories for the overspending prompt
    pub fn luxury_prompt_table() -> String {
        Self::all()
            .iter()
            .filter(|c| c.is_luxury())
            .map(|c| format!("{}({})", c.label(), c.id()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Serializable view of one enumeration entry (for `GET /categories`)
#[derive(Debug, Clone, Serialize)]
pub struct CategoryInfo {
    pub category_id: CategoryId,
    pub name: &'static str,
    pub label: &'static str,
    pub luxury: bool,
}

impl From<Category> for CategoryInfo {
    fn from(c: Category) -> Self {
        Self {
            category_id: c.id(),
            name: c.as_str(),
            label: c.label(),
            luxury: c.is_luxury(),
        }
    }
}
