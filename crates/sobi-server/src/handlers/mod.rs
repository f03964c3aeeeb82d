//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

use serde::Deserialize;

pub mod analysis;
pub mod classify;
pub mod health;
pub mod recommend;

// Re-export all handlers for use in router
pub use analysis::*;
pub use classify::*;
pub use health::*;
pub use recommend::*;

/// List body accepted either bare or wrapped as `{"exps": [...]}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListBody<T> {
    Bare(Vec<T>),
    Wrapped { exps: Vec<T> },
}

impl<T> ListBody<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            ListBody::Bare(items) | ListBody::Wrapped { exps: items } => items,
        }
    }
}
