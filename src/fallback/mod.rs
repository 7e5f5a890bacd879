//! Fallback escalation services
//!
//! When worker data is missing or not trustworthy enough, the orchestrator
//! escalates to a fallback service injected at construction. Backends answer
//! from web search plus synthesis, from the LLM directly, or as an ordered
//! chain that promotes the next backend on failure.

pub mod chain;
pub mod direct;
pub mod mock;
pub mod web_search;

pub use chain::ChainFallback;
pub use direct::DirectLlmFallback;
pub use mock::StaticFallback;
pub use web_search::{TavilyClient, WebSearchFallback};

use crate::config::{EngineConfig, FallbackSystem};
use crate::gemini::GeminiClient;
use crate::models::WorkerKind;
use crate::workers::{WorkerPayload, WorkerResult, WorkerResults};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FallbackStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FallbackResponse {
    pub status: FallbackStatus,
    pub response: Option<String>,
    /// Failure detail when `status` is `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub references: Vec<String>,
    pub model: String,
    /// Backend that produced this response
    pub backend: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    pub execution_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl FallbackResponse {
    pub fn success(backend: &str, model: &str, response: String, references: Vec<String>) -> Self {
        Self {
            status: FallbackStatus::Success,
            response: Some(response),
            message: None,
            references,
            model: model.to_string(),
            backend: backend.to_string(),
            confidence: None,
            execution_time_ms: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn error(backend: &str, model: &str, message: impl Into<String>) -> Self {
        Self {
            status: FallbackStatus::Error,
            response: None,
            message: Some(message.into()),
            references: vec![],
            model: model.to_string(),
            backend: backend.to_string(),
            confidence: None,
            execution_time_ms: 0,
            timestamp: Utc::now(),
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_elapsed(mut self, elapsed_ms: u64) -> Self {
        self.execution_time_ms = elapsed_ms;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == FallbackStatus::Success
    }
}

/// Escalation record attached to the result envelope
#[derive(Debug, Clone, Serialize)]
pub struct FallbackOutcome {
    pub trigger_reason: String,
    /// Workers whose data was handed to the fallback
    pub contributing_workers: Vec<WorkerKind>,
    pub response: FallbackResponse,
}

impl FallbackOutcome {
    pub fn failed(&self) -> bool {
        !self.response.is_success()
    }
}

/// Fallback answering path.
///
/// Implementations should report unavailability through an error
/// `FallbackResponse`; `Err` is reserved for unexpected transport failures.
#[async_trait::async_trait]
pub trait FallbackService: Send + Sync {
    fn name(&self) -> &str;

    fn is_available(&self) -> bool;

    async fn answer(&self, query: &str, partial_results: Option<&WorkerResults>) -> Result<FallbackResponse>;
}

const SYSTEM_PROMPT: &str = r#"You are a professional financial analyst.

Guidelines:
- Answer only with facts supported by the provided data or sources
- State clearly when data is missing or incomplete
- Do not speculate about future prices or forecasts
- Be structured and concise

Format: Provide a structured answer suitable for financial decision-making."#;

pub(crate) fn system_prompt() -> &'static str {
    SYSTEM_PROMPT
}

/// Render successful worker data into prompt context
pub fn format_partial_results(results: &WorkerResults) -> String {
    let mut out = String::new();

    for (kind, result) in results {
        let WorkerResult::Output(output) = result else {
            continue;
        };
        if !result.is_success() {
            continue;
        }

        let _ = writeln!(out, "\n{}:", kind);
        match &output.payload {
            WorkerPayload::Prices(prices) => {
                for (symbol, quote) in prices.quotes.iter().filter(|(_, q)| q.error.is_none()).take(5) {
                    let _ = writeln!(
                        out,
                        "  {}: price {} change {} ({}%)",
                        symbol,
                        fmt_opt(quote.current_price),
                        fmt_opt(quote.change),
                        fmt_opt(quote.change_pct)
                    );
                }
            }
            WorkerPayload::Fundamentals(fundamentals) => {
                for (company, metrics) in fundamentals
                    .companies
                    .iter()
                    .filter(|(_, m)| m.error.is_none())
                    .take(5)
                {
                    let line = ["pe_ratio", "pb_ratio", "roe", "market_cap", "dividend_yield"]
                        .iter()
                        .map(|m| {
                            let value = metrics
                                .metrics
                                .get(*m)
                                .filter(|v| !v.is_null())
                                .map(|v| v.to_string())
                                .unwrap_or_else(|| "N/A".to_string());
                            format!("{}={}", m, value)
                        })
                        .collect::<Vec<_>>()
                        .join(", ");
                    let _ = writeln!(out, "  {}: {}", company, line);
                }
            }
            WorkerPayload::Macro(macro_data) => {
                if let Some(region) = &macro_data.region {
                    let _ = writeln!(out, "  Region: {}", region);
                }
                for (name, indicator) in macro_data.indicators.iter().filter(|(_, i)| i.is_success()) {
                    let _ = writeln!(
                        out,
                        "  {}: {} {}",
                        name.replace('_', " "),
                        fmt_opt(indicator.latest_value),
                        indicator.unit.as_deref().unwrap_or("")
                    );
                }
            }
            WorkerPayload::News(news) => {
                let _ = writeln!(out, "  Found {} recent articles:", news.articles.len());
                for article in news.articles.iter().take(3) {
                    let preview: String = article.content.chars().take(300).collect();
                    let _ = writeln!(
                        out,
                        "  - {} ({}): {}",
                        article.title,
                        article.source,
                        preview.replace('\n', " ").trim()
                    );
                }
            }
            WorkerPayload::NewsAnalysis(analysis) => match &analysis.synthesis {
                Some(synthesis) => {
                    let _ = writeln!(out, "  Summary: {}", synthesis.summary);
                }
                None => {
                    let _ = writeln!(out, "  No news analysis available");
                }
            },
            WorkerPayload::Empty => {
                let _ = writeln!(out, "  No data");
            }
        }
    }

    out
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_else(|| "N/A".to_string())
}

/// Full user prompt for an escalated query
pub fn build_user_prompt(query: &str, partial_results: Option<&WorkerResults>, web_context: &str) -> String {
    let mut prompt = format!("User Query: {}\n", query);

    if !web_context.is_empty() {
        prompt.push('\n');
        prompt.push_str(web_context);
        prompt.push('\n');
    }

    if let Some(results) = partial_results {
        let data = format_partial_results(results);
        if !data.is_empty() {
            prompt.push_str("\nAvailable Financial Data:\n");
            prompt.push_str(&data);
        }
    }

    prompt.push_str(
        "\nTask: Answer the user's query from the available data and sources. \
         If data is limited, say so and give the best factual answer possible.",
    );
    prompt
}

/// Workers whose data made it into the prompt
pub fn contributing_workers(results: &WorkerResults) -> Vec<WorkerKind> {
    results
        .iter()
        .filter(|(_, r)| r.is_success())
        .map(|(k, _)| *k)
        .collect()
}

/// Build the configured fallback backend
pub fn build_fallback(config: &EngineConfig) -> Result<Arc<dyn FallbackService>> {
    let llm = |config: &EngineConfig| -> Option<Arc<GeminiClient>> {
        let key = config.gemini_api_key.clone()?;
        GeminiClient::new(key, config.gemini_model.clone()).ok().map(Arc::new)
    };

    let primary = || -> Result<Arc<dyn FallbackService>> {
        let search = match &config.tavily_api_key {
            Some(key) => Some(TavilyClient::new(key.clone(), config.fallback_max_sources)?),
            None => None,
        };
        Ok(Arc::new(WebSearchFallback::new(search, llm(config))))
    };
    let secondary = || -> Arc<dyn FallbackService> { Arc::new(DirectLlmFallback::new(llm(config))) };

    let service: Arc<dyn FallbackService> = match config.fallback_system {
        FallbackSystem::Primary => primary()?,
        FallbackSystem::Secondary => secondary(),
        FallbackSystem::Chain => Arc::new(ChainFallback::new(vec![primary()?, secondary()])),
    };

    info!(
        backend = service.name(),
        available = service.is_available(),
        "Fallback service configured"
    );

    Ok(service)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::{
        MacroIndicator, MacroPayload, PricesPayload, Quote, WorkerError,
    };
    use std::collections::BTreeMap;

    #[test]
    fn test_partial_results_skip_failures() {
        let results = WorkerResults::from([
            (
                WorkerKind::Prices,
                WorkerResult::success(WorkerPayload::Prices(PricesPayload {
                    quotes: BTreeMap::from([("AAPL".to_string(), Quote::complete(190.5, 1.25, 0.66))]),
                })),
            ),
            (
                WorkerKind::Macro,
                WorkerResult::success(WorkerPayload::Macro(MacroPayload {
                    region: Some("US".to_string()),
                    indicators: BTreeMap::from([(
                        "core_cpi".to_string(),
                        MacroIndicator {
                            status: "success".to_string(),
                            latest_value: Some(3.9),
                            unit: Some("%".to_string()),
                            date: None,
                        },
                    )]),
                })),
            ),
            (
                WorkerKind::News,
                WorkerError::network(WorkerKind::News, "down").into(),
            ),
        ]);

        let text = format_partial_results(&results);
        assert!(text.contains("AAPL: price 190.50 change 1.25 (0.66%)"));
        assert!(text.contains("core cpi: 3.90 %"));
        assert!(!text.contains("NEWS"));
        assert_eq!(
            contributing_workers(&results),
            vec![WorkerKind::Macro, WorkerKind::Prices]
        );
    }

    #[test]
    fn test_user_prompt_sections() {
        let prompt = build_user_prompt("TCS fundamentals", None, "Web Sources:\n[1] x");
        assert!(prompt.starts_with("User Query: TCS fundamentals"));
        assert!(prompt.contains("Web Sources"));
        assert!(!prompt.contains("Available Financial Data"));
    }

    #[test]
    fn test_build_fallback_without_keys_is_unavailable() {
        for system in [FallbackSystem::Primary, FallbackSystem::Secondary, FallbackSystem::Chain] {
            let config = EngineConfig {
                fallback_system: system,
                ..EngineConfig::default()
            };
            let service = build_fallback(&config).unwrap();
            assert!(!service.is_available());
        }
    }
}
