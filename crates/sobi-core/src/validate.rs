//! Response validation
//!
//! Model output is untrusted free text. Every function here turns a raw reply
//! into a structurally valid, range-bounded value and never fails: when the
//! reply is unusable the result is a [`Validated::Fallback`] carrying the
//! substituted value and the reason it was needed.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::ai::parsing::{extract_json, preview};
use crate::category::{Category, CategoryId};

/// Number of overspending categories reported
pub const OVERSPENDING_COUNT: usize = 3;

/// Maximum number of recommended products
pub const RECOMMENDATION_COUNT: usize = 3;

/// Why a default was substituted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackReason {
    /// No usable payload in the reply
    Malformed(String),
    /// Some entries were missing, unusable or out of range
    Partial { defaulted: usize, total: usize },
    /// Fewer valid values than required
    Insufficient { found: usize, required: usize },
    /// The provider call failed and the configured policy is to carry on
    ProviderFailure(String),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(detail) => write!(f, "malformed reply: {}", detail),
            Self::Partial { defaulted, total } => {
                write!(f, "{} of {} entries defaulted", defaulted, total)
            }
            Self::Insufficient { found, required } => {
                write!(f, "found {} valid values, needed {}", found, required)
            }
            Self::ProviderFailure(detail) => write!(f, "provider failure: {}", detail),
        }
    }
}

/// A validated value, possibly substituted
#[derive(Debug, Clone, PartialEq)]
pub enum Validated<T> {
    Ok(T),
    Fallback { value: T, reason: FallbackReason },
}

impl<T> Validated<T> {
    pub fn value(&self) -> &T {
        match self {
            Self::Ok(v) | Self::Fallback { value: v, .. } => v,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Ok(v) | Self::Fallback { value: v, .. } => v,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback { .. })
    }

    pub fn reason(&self) -> Option<&FallbackReason> {
        match self {
            Self::Ok(_) => None,
            Self::Fallback { reason, .. } => Some(reason),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Validated<U> {
        match self {
            Self::Ok(v) => Validated::Ok(f(v)),
            Self::Fallback { value, reason } => Validated::Fallback {
                value: f(value),
                reason,
            },
        }
    }
}

/// Cast a JSON value to an integer
///
/// Accepts integers, floats with no fractional part and numeric strings.
fn cast_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .filter(|f| *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0)
                    .map(|f| f as i64)
            })
        }
        _ => None,
    }
}

/// Pull `(id, category)` out of one reply entry
fn entry_pair(entry: &Value) -> (Option<i64>, Option<i64>) {
    match entry {
        Value::Object(map) => {
            let id = map
                .get("expenditure_id")
                .or_else(|| map.get("id"))
                .and_then(cast_int);
            let category = map
                .get("category_id")
                .or_else(|| map.get("category"))
                .and_then(cast_int);
            (id, category)
        }
        Value::Array(items) if items.len() == 2 => (cast_int(&items[0]), cast_int(&items[1])),
        _ => (None, None),
    }
}

/// Results array of a classification reply (object with `results` or a bare array)
fn results_array(value: &Value) -> Option<&Vec<Value>> {
    match value {
        Value::Object(map) => map.get("results").and_then(Value::as_array),
        Value::Array(items) => Some(items),
        _ => None,
    }
}

/// Validate a classification reply for one batch
///
/// The returned map has an entry for every id in `batch_ids`. Ids absent from
/// the reply, and entries whose category cannot be cast or falls outside the
/// enumeration, get the sentinel. Ids the batch did not contain are ignored;
/// the first entry for a repeated id wins.
pub fn validate_classification_batch(
    raw: &str,
    batch_ids: &[i64],
) -> Validated<HashMap<i64, Category>> {
    let all_sentinel = || {
        batch_ids
            .iter()
            .map(|id| (*id, Category::SENTINEL))
            .collect::<HashMap<_, _>>()
    };

    let parsed = match extract_json(raw) {
        Ok(v) => v,
        Err(_) => {
            return Validated::Fallback {
                value: all_sentinel(),
                reason: FallbackReason::Malformed(format!("no JSON in {:?}", preview(raw))),
            }
        }
    };
    let Some(entries) = results_array(&parsed) else {
        return Validated::Fallback {
            value: all_sentinel(),
            reason: FallbackReason::Malformed("missing results array".into()),
        };
    };

    let expected: HashSet<i64> = batch_ids.iter().copied().collect();
    let mut decided: HashMap<i64, Category> = HashMap::with_capacity(batch_ids.len());
    let mut defaulted = 0usize;

    for entry in entries {
        let (Some(id), category) = entry_pair(entry) else {
            continue;
        };
        if !expected.contains(&id) || decided.contains_key(&id) {
            continue;
        }
        let category = match category.and_then(Category::from_id) {
            Some(c) => c,
            None => {
                defaulted += 1;
                Category::SENTINEL
            }
        };
        decided.insert(id, category);
    }

    for id in batch_ids {
        decided.entry(*id).or_insert_with(|| {
            defaulted += 1;
            Category::SENTINEL
        });
    }

    if defaulted == 0 {
        Validated::Ok(decided)
    } else if defaulted == expected.len() && entries.is_empty() {
        Validated::Fallback {
            value: decided,
            reason: FallbackReason::Malformed("empty results array".into()),
        }
    } else {
        Validated::Fallback {
            value: decided,
            reason: FallbackReason::Partial {
                defaulted,
                total: expected.len(),
            },
        }
    }
}

/// Digit runs not glued to ASCII letters or digits (`A1` and `gpt-4o` are
/// skipped, `6번` is not)
fn integer_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?-u:\b)[0-9]+(?-u:\b)").expect("valid regex"))
}

/// Distinct luxury-range ids in order of appearance
fn collect_luxury(ids: impl IntoIterator<Item = i64>) -> Vec<CategoryId> {
    let mut seen = Vec::with_capacity(OVERSPENDING_COUNT);
    for id in ids {
        if Category::LUXURY_RANGE.contains(&id) && !seen.contains(&id) {
            seen.push(id);
            if seen.len() == OVERSPENDING_COUNT {
                break;
            }
        }
    }
    seen
}

/// Validate an overspending ranking reply
///
/// Structured output (`{"results": [..]}` or a bare array) is read first;
/// otherwise the text is scanned for standalone integers. Only ids in the
/// luxury range count, duplicates are dropped and the first three are kept.
/// Fewer than three means the default triple.
pub fn validate_overspending(raw: &str) -> Validated<[CategoryId; 3]> {
    let from_json = extract_json(raw).ok().and_then(|v| {
        results_array(&v).map(|items| collect_luxury(items.iter().filter_map(cast_int)))
    });

    let found = match from_json {
        Some(ids) if ids.len() == OVERSPENDING_COUNT => ids,
        _ => collect_luxury(
            integer_pattern()
                .find_iter(raw)
                .filter_map(|m| m.as_str().parse::<i64>().ok()),
        ),
    };

    match <[CategoryId; 3]>::try_from(found.as_slice()) {
        Ok(triple) => Validated::Ok(triple),
        Err(_) => Validated::Fallback {
            value: Category::DEFAULT_OVERSPENDING,
            reason: FallbackReason::Insufficient {
                found: found.len(),
                required: OVERSPENDING_COUNT,
            },
        },
    }
}

/// Strip quotes, brackets and whitespace around one reply token
fn clean_token(token: &str) -> &str {
    token.trim_matches(|c: char| {
        c.is_whitespace() || matches!(c, '"' | '\'' | '`' | '[' | ']' | '(' | ')' | '{' | '}')
    })
}

/// Validate a savings recommendation reply
///
/// The reply is a comma (or newline) separated list of product codes. Codes
/// not in `candidates` are dropped, repeats are removed and the list is cut
/// to three. A short list is padded by walking `candidates` in order, so the
/// result has fewer than three codes only when there are fewer candidates.
pub fn validate_recommendations(raw: &str, candidates: &[String]) -> Validated<Vec<String>> {
    let candidate_set: HashSet<&str> = candidates.iter().map(String::as_str).collect();
    let target = RECOMMENDATION_COUNT.min(candidate_set.len());

    let mut chosen: Vec<String> = Vec::with_capacity(target);
    for token in raw.split([',', '\n']).map(clean_token) {
        if chosen.len() == target {
            break;
        }
        if candidate_set.contains(token) && !chosen.iter().any(|c| c == token) {
            chosen.push(token.to_string());
        }
    }

    if chosen.len() == target {
        return Validated::Ok(chosen);
    }

    let found = chosen.len();
    for code in candidates {
        if chosen.len() == target {
            break;
        }
        if !chosen.contains(code) {
            chosen.push(code.clone());
        }
    }

    Validated::Fallback {
        value: chosen,
        reason: FallbackReason::Insufficient {
            found,
            required: target,
        },
    }
}
