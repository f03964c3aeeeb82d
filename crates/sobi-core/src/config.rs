//! Service configuration
//!
//! Config is resolved in three layers:
//! 1. Embedded defaults (`config/sobi.toml`, compiled into binary)
//! 2. Override file (`--config`, `SOBI_CONFIG`, or ~/.local/share/sobi/config.toml)
//! 3. Environment variables
//!
//! The override file only needs the keys it changes. The API key is only ever
//! read from the environment.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::keywords::{KeywordMatcher, KeywordRuleConfig};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/sobi.toml");

/// Tasks that talk to the model, each with its own model id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    /// Batched expenditure classification
    Classification,
    /// Overspending category ranking
    Analytics,
    /// Savings product ranking
    Recommendation,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classification => "classification",
            Self::Analytics => "analytics",
            Self::Recommendation => "recommendation",
        }
    }
}

/// Which LLM backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[serde(alias = "openai_compatible")]
    OpenAI,
    Ollama,
    Mock,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" | "openai_compatible" | "vllm" | "localai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "mock" => Ok(Self::Mock),
            _ => Err(format!("Unknown LLM backend: {}", s)),
        }
    }
}

/// What the pipeline does when the provider call itself fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderErrorPolicy {
    /// Fail the whole request
    #[default]
    Propagate,
    /// Default every affected id to the sentinel and carry on
    Fallback,
}

#[derive(Debug, Clone, Serialize)]
pub struct LlmConfig {
    pub backend: BackendKind,
    pub base_url: String,
    pub timeout: Duration,
    /// Never serialized; only read from the environment
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelConfig {
    pub classification: String,
    pub analytics: String,
    pub recommendation: String,
}

impl ModelConfig {
    pub fn for_task(&self, task: TaskType) -> &str {
        match task {
            TaskType::Classification => &self.classification,
            TaskType::Analytics => &self.analytics,
            TaskType::Recommendation => &self.recommendation,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineConfig {
    /// Representative items per model call
    pub batch_size: usize,
    /// Batches allowed in flight at once
    pub max_concurrency: usize,
    pub on_provider_error: ProviderErrorPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: 16,
            max_concurrency: 16,
            on_provider_error: ProviderErrorPolicy::Propagate,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsConfig {
    /// Ask for a strict JSON schema instead of free text
    pub structured_output: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
}

/// Effective configuration
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub models: ModelConfig,
    pub pipeline: PipelineConfig,
    pub analytics: AnalyticsConfig,
    pub server: ServerSettings,
    pub prompt_override_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword_rules: Option<Vec<KeywordRuleConfig>>,
    /// Override file that was applied, if any
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Config {
    /// Embedded defaults only (no file, no environment)
    pub fn embedded() -> Self {
        let mut config = Self::fallback();
        match toml::from_str::<RawConfig>(DEFAULT_CONFIG) {
            Ok(raw) => config.apply(raw),
            Err(e) => tracing::warn!(error = %e, "Embedded config failed to parse, using built-in values"),
        }
        config
    }

    /// Hard-coded values underneath the embedded file
    fn fallback() -> Self {
        Self {
            llm: LlmConfig {
                backend: BackendKind::OpenAI,
                base_url: "https://api.openai.com".to_string(),
                timeout: Duration::from_secs(30),
                api_key: None,
            },
            models: ModelConfig {
                classification: "gpt-4.1-nano".to_string(),
                analytics: "gpt-4o".to_string(),
                recommendation: "gpt-4o".to_string(),
            },
            pipeline: PipelineConfig::default(),
            analytics: AnalyticsConfig {
                structured_output: true,
            },
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8000,
                allowed_origins: vec![],
            },
            prompt_override_dir: None,
            keyword_rules: None,
            source: None,
        }
    }

    /// Load the full layered configuration
    ///
    /// An explicit path must exist; the implicit locations are optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = Self::embedded();

        let override_path = match path {
            Some(p) => {
                if !p.exists() {
                    return Err(Error::Config(format!(
                        "config file not found: {}",
                        p.display()
                    )));
                }
                Some(p.to_path_buf())
            }
            None => std::env::var("SOBI_CONFIG")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .or_else(|| default_config_path().filter(|p| p.exists())),
        };

        if let Some(ref p) = override_path {
            let content = fs::read_to_string(p)?;
            config.apply(toml::from_str(&content)?);
            config.source = Some(p.clone());
        }

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse an override document on top of the embedded defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let mut config = Self::embedded();
        config.apply(toml::from_str(content)?);
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, raw: RawConfig) {
        if let Some(llm) = raw.llm {
            if let Some(backend) = llm.backend {
                self.llm.backend = backend;
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(secs) = llm.timeout_secs {
                self.llm.timeout = Duration::from_secs(secs);
            }
        }

        if let Some(models) = raw.models {
            if let Some(m) = models.classification {
                self.models.classification = m;
            }
            if let Some(m) = models.analytics {
                self.models.analytics = m;
            }
            if let Some(m) = models.recommendation {
                self.models.recommendation = m;
            }
        }

        if let Some(pipeline) = raw.pipeline {
            if let Some(size) = pipeline.batch_size {
                self.pipeline.batch_size = size;
            }
            if let Some(max) = pipeline.max_concurrency {
                self.pipeline.max_concurrency = max;
            }
            if let Some(policy) = pipeline.on_provider_error {
                self.pipeline.on_provider_error = policy;
            }
        }

        if let Some(analytics) = raw.analytics {
            if let Some(structured) = analytics.structured_output {
                self.analytics.structured_output = structured;
            }
        }

        if let Some(server) = raw.server {
            if let Some(host) = server.host {
                self.server.host = host;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(origins) = server.allowed_origins {
                self.server.allowed_origins = origins;
            }
        }

        if let Some(prompts) = raw.prompts {
            if let Some(dir) = prompts.override_dir {
                self.prompt_override_dir = Some(dir);
            }
        }

        if let Some(rules) = raw.keyword_rules {
            self.keyword_rules = Some(rules);
        }
    }

    /// Apply environment overrides through a lookup function
    ///
    /// Unparseable numeric values are ignored with a warning rather than
    /// silently replaced.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(backend) = get("SOBI_LLM_BACKEND") {
            match backend.parse() {
                Ok(kind) => self.llm.backend = kind,
                Err(e) => tracing::warn!(error = %e, "Ignoring SOBI_LLM_BACKEND"),
            }
        }
        if let Some(url) = get("SOBI_LLM_BASE_URL") {
            self.llm.base_url = url;
        } else if self.llm.backend == BackendKind::Ollama {
            if let Some(host) = get("OLLAMA_HOST") {
                self.llm.base_url = host;
            }
        }
        self.llm.api_key = get("OPENAI_API_KEY").or_else(|| get("API_KEY"));

        if let Some(v) = get("SOBI_BATCH_SIZE") {
            match v.trim().parse() {
                Ok(n) => self.pipeline.batch_size = n,
                Err(_) => tracing::warn!(value = %v, "Ignoring non-numeric SOBI_BATCH_SIZE"),
            }
        }
        if let Some(v) = get("SOBI_MAX_CONCURRENCY") {
            match v.trim().parse() {
                Ok(n) => self.pipeline.max_concurrency = n,
                Err(_) => tracing::warn!(value = %v, "Ignoring non-numeric SOBI_MAX_CONCURRENCY"),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pipeline.batch_size == 0 {
            return Err(Error::Config("pipeline.batch_size must be at least 1".into()));
        }
        if self.pipeline.max_concurrency == 0 {
            return Err(Error::Config(
                "pipeline.max_concurrency must be at least 1".into(),
            ));
        }
        if let Some(ref rules) = self.keyword_rules {
            KeywordMatcher::from_config(rules)?;
        }
        Ok(())
    }

    /// Keyword matcher described by this config
    pub fn keyword_matcher(&self) -> Result<KeywordMatcher> {
        match self.keyword_rules {
            Some(ref rules) => KeywordMatcher::from_config(rules),
            None => Ok(KeywordMatcher::new()),
        }
    }

    /// Effective config as TOML, without secrets
    pub fn to_toml_string(&self) -> Result<String> {
        let raw = RawConfig::from(self);
        toml::to_string_pretty(&raw).map_err(|e| Error::Config(e.to_string()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::embedded()
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("sobi").join("config.toml"))
}

/// Raw config structure for TOML parsing
#[derive(Debug, Default, Deserialize, Serialize)]
struct RawConfig {
    llm: Option<RawLlm>,
    models: Option<RawModels>,
    pipeline: Option<RawPipeline>,
    analytics: Option<RawAnalytics>,
    server: Option<RawServer>,
    prompts: Option<RawPrompts>,
    keyword_rules: Option<Vec<KeywordRuleConfig>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawLlm {
    backend: Option<BackendKind>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawModels {
    classification: Option<String>,
    analytics: Option<String>,
    recommendation: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawPipeline {
    batch_size: Option<usize>,
    max_concurrency: Option<usize>,
    on_provider_error: Option<ProviderErrorPolicy>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawAnalytics {
    structured_output: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawServer {
    host: Option<String>,
    port: Option<u16>,
    allowed_origins: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct RawPrompts {
    override_dir: Option<PathBuf>,
}

impl From<&Config> for RawConfig {
    fn from(c: &Config) -> Self {
        Self {
            llm: Some(RawLlm {
                backend: Some(c.llm.backend),
                base_url: Some(c.llm.base_url.clone()),
                timeout_secs: Some(c.llm.timeout.as_secs()),
            }),
            models: Some(RawModels {
                classification: Some(c.models.classification.clone()),
                analytics: Some(c.models.analytics.clone()),
                recommendation: Some(c.models.recommendation.clone()),
            }),
            pipeline: Some(RawPipeline {
                batch_size: Some(c.pipeline.batch_size),
                max_concurrency: Some(c.pipeline.max_concurrency),
                on_provider_error: Some(c.pipeline.on_provider_error),
            }),
            analytics: Some(RawAnalytics {
                structured_output: Some(c.analytics.structured_output),
            }),
            server: Some(RawServer {
                host: Some(c.server.host.clone()),
                port: Some(c.server.port),
                allowed_origins: Some(c.server.allowed_origins.clone()),
            }),
            prompts: c.prompt_override_dir.as_ref().map(|d| RawPrompts {
                override_dir: Some(d.clone()),
            }),
            keyword_rules: c.keyword_rules.clone(),
        }
    }
}
