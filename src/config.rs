use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "screening-analysis";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default completion endpoint (local Ollama-compatible generate API).
pub const DEFAULT_ENDPOINT_URL: &str = "http://localhost:11434/api/generate";
pub const DEFAULT_MODEL: &str = "screening-analyst";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_METRICS_CAPACITY: usize = 100;

pub const ENV_ENDPOINT: &str = "SCREENING_AI_ENDPOINT";
pub const ENV_MODEL: &str = "SCREENING_AI_MODEL";
pub const ENV_API_KEY: &str = "SCREENING_AI_API_KEY";
pub const ENV_TIMEOUT_SECS: &str = "SCREENING_AI_TIMEOUT_SECS";
pub const ENV_METRICS_CAPACITY: &str = "SCREENING_METRICS_CAPACITY";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "screening_analysis=info,warn"
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}

/// Size caps applied when assembling a result from either analysis path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutputLimits {
    pub max_tests: usize,
    pub max_treatments: usize,
    pub max_next_steps: usize,
    pub max_hospitals: usize,
    /// Per-item character cap for list entries.
    pub max_item_length: usize,
    /// Character cap for the risk summary.
    pub max_summary_length: usize,
}

impl Default for OutputLimits {
    fn default() -> Self {
        Self {
            max_tests: 8,
            max_treatments: 6,
            max_next_steps: 6,
            max_hospitals: 5,
            max_item_length: 200,
            max_summary_length: 1000,
        }
    }
}

/// Recognized options for the analysis pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisConfig {
    pub endpoint_url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    /// Sanitation cap for free-text answers (characters).
    pub answer_max_length: usize,
    /// Sanitation cap for notes (characters).
    pub note_max_length: usize,
    pub max_answers: usize,
    pub output: OutputLimits,
    pub metrics_capacity: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint_url: DEFAULT_ENDPOINT_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            answer_max_length: 500,
            note_max_length: 200,
            max_answers: 100,
            output: OutputLimits::default(),
            metrics_capacity: DEFAULT_METRICS_CAPACITY,
        }
    }
}

impl AnalysisConfig {
    /// Defaults overlaid with `SCREENING_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (environment, test map, ...).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_ENDPOINT).filter(|v| !v.trim().is_empty()) {
            config.endpoint_url = url.trim().to_string();
        }
        if let Some(model) = lookup(ENV_MODEL).filter(|v| !v.trim().is_empty()) {
            config.model = model.trim().to_string();
        }
        config.api_key = lookup(ENV_API_KEY).filter(|v| !v.trim().is_empty());

        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs = parse_positive(ENV_TIMEOUT_SECS, &raw)?;
            config.request_timeout = Duration::from_secs(secs as u64);
        }
        if let Some(raw) = lookup(ENV_METRICS_CAPACITY) {
            config.metrics_capacity = parse_positive(ENV_METRICS_CAPACITY, &raw)?;
        }

        Ok(config)
    }

    /// Maximum rendered answer length accepted by input validation.
    pub fn max_rendered_answer_length(&self) -> usize {
        self.answer_max_length * 2
    }
}

fn parse_positive(key: &'static str, raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        }),
    }
}
