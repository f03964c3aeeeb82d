//! Error types for sobi
//!
//! Only transport, configuration and scheduling failures are errors. Content
//! problems in model replies never surface here; the validator absorbs them.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("LLM provider error: {0}")]
    Provider(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Scheduling error: {0}")]
    Scheduling(String),
}

impl Error {
    /// Whether this error came from talking to the LLM provider
    ///
    /// These are the only failures that reach the HTTP boundary as a request
    /// failure (502); everything else is a server-side problem.
    pub fn is_provider_failure(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Provider(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
