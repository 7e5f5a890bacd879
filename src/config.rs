//! Environment-driven engine configuration

use crate::error::OrchestrationError;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Which fallback backend answers escalated queries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FallbackSystem {
    /// Web search plus LLM synthesis
    #[default]
    Primary,
    /// Direct LLM answer
    Secondary,
    /// Primary first, secondary on failure
    Chain,
}

impl FromStr for FallbackSystem {
    type Err = OrchestrationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "primary" | "groq" => Ok(FallbackSystem::Primary),
            "secondary" | "openai" => Ok(FallbackSystem::Secondary),
            "chain" | "hybrid" => Ok(FallbackSystem::Chain),
            other => Err(OrchestrationError::ConfigError(format!(
                "Unknown FALLBACK_SYSTEM '{}' (expected primary, secondary or chain)",
                other
            ))),
        }
    }
}

/// Exponential backoff for retryable worker errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 30_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based), capped at `max_delay_ms`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        Duration::from_millis((base as u64).min(self.max_delay_ms))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub data_service_url: Option<String>,
    pub worker_timeout_secs: u64,
    pub retry: RetryConfig,
    /// Parent deadline for the whole worker batch; none by default
    pub request_deadline_secs: Option<u64>,
    pub fallback_system: FallbackSystem,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub tavily_api_key: Option<String>,
    pub fallback_max_sources: usize,
    /// Audit records kept in memory; the oldest are evicted first
    pub audit_max_records: usize,
    pub port: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_service_url: None,
            worker_timeout_secs: 30,
            retry: RetryConfig::default(),
            request_deadline_secs: None,
            fallback_system: FallbackSystem::Primary,
            gemini_api_key: None,
            gemini_model: "gemini-2.5-flash".to_string(),
            tavily_api_key: None,
            fallback_max_sources: 5,
            audit_max_records: 1_000,
            port: 8080,
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<T: FromStr>(key: &str) -> Result<Option<T>> {
    match non_empty(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| OrchestrationError::ConfigError(format!("Invalid value for {}: '{}'", key, raw))),
        None => Ok(None),
    }
}

impl EngineConfig {
    /// Load `.env` (if present) and read the engine settings from the environment
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let defaults = Self::default();
        let retry = RetryConfig {
            max_retries: parse_var("WORKER_MAX_RETRIES")?.unwrap_or(defaults.retry.max_retries),
            initial_delay_ms: parse_var("WORKER_RETRY_INITIAL_DELAY_MS")?
                .unwrap_or(defaults.retry.initial_delay_ms),
            ..defaults.retry.clone()
        };

        let fallback_system = match non_empty("FALLBACK_SYSTEM") {
            Some(raw) => raw.parse()?,
            None => defaults.fallback_system,
        };

        let port = match parse_var::<u16>("PORT")? {
            Some(port) => port,
            None => parse_var("API_PORT")?.unwrap_or(defaults.port),
        };

        let config = Self {
            data_service_url: non_empty("DATA_SERVICE_URL").map(|u| u.trim_end_matches('/').to_string()),
            worker_timeout_secs: parse_var("WORKER_TIMEOUT_SECS")?.unwrap_or(defaults.worker_timeout_secs),
            retry,
            request_deadline_secs: parse_var("REQUEST_DEADLINE_SECS")?,
            fallback_system,
            gemini_api_key: non_empty("GEMINI_API_KEY"),
            gemini_model: non_empty("GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            tavily_api_key: non_empty("TAVILY_API_KEY"),
            fallback_max_sources: parse_var("FALLBACK_MAX_SOURCES")?
                .unwrap_or(defaults.fallback_max_sources),
            audit_max_records: parse_var("AUDIT_MAX_RECORDS")?.unwrap_or(defaults.audit_max_records),
            port,
        };

        config.validate()?;
        Ok(config)
    }

    /// Hard errors for unusable values; returns warnings for missing optional keys
    pub fn validate(&self) -> Result<Vec<String>> {
        if self.worker_timeout_secs == 0 {
            return Err(OrchestrationError::ConfigError(
                "WORKER_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        if self.request_deadline_secs == Some(0) {
            return Err(OrchestrationError::ConfigError(
                "REQUEST_DEADLINE_SECS must be greater than zero when set".to_string(),
            ));
        }
        if self.fallback_max_sources == 0 {
            return Err(OrchestrationError::ConfigError(
                "FALLBACK_MAX_SOURCES must be greater than zero".to_string(),
            ));
        }
        if self.audit_max_records == 0 {
            return Err(OrchestrationError::ConfigError(
                "AUDIT_MAX_RECORDS must be greater than zero".to_string(),
            ));
        }

        let mut warnings = Vec::new();
        if self.data_service_url.is_none() {
            warnings.push("DATA_SERVICE_URL not set; data workers will report NETWORK_ERROR".to_string());
        }
        if self.gemini_api_key.is_none() {
            warnings.push("GEMINI_API_KEY not set; LLM fallback is unavailable".to_string());
        }
        if self.tavily_api_key.is_none() && self.fallback_system != FallbackSystem::Secondary {
            warnings.push("TAVILY_API_KEY not set; web search fallback is unavailable".to_string());
        }
        Ok(warnings)
    }

    pub fn worker_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout_secs)
    }

    pub fn request_deadline(&self) -> Option<Duration> {
        self.request_deadline_secs.map(Duration::from_secs)
    }
}
