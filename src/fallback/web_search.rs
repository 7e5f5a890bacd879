//! Primary fallback: web search plus LLM synthesis

use super::{build_user_prompt, system_prompt, FallbackResponse, FallbackService};
use crate::error::OrchestrationError;
use crate::gemini::GeminiClient;
use crate::workers::WorkerResults;
use crate::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";
const BACKEND: &str = "web_search";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

/// Tavily search API client
pub struct TavilyClient {
    client: Client,
    api_key: String,
    max_results: usize,
    endpoint: String,
}

impl TavilyClient {
    pub fn new(api_key: String, max_results: usize) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| OrchestrationError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            max_results,
            endpoint: TAVILY_SEARCH_URL.to_string(),
        })
    }

    pub async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let body = serde_json::json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": self.max_results,
            "search_depth": "basic",
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| OrchestrationError::FallbackError(format!("Web search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(OrchestrationError::FallbackError(format!(
                "Web search returned {}: {}",
                status, text
            )));
        }

        let parsed: SearchResponse = response.json().await?;
        Ok(parsed.results.into_iter().take(self.max_results).collect())
    }
}

/// Render search hits as numbered sources for the prompt
pub fn format_sources(hits: &[SearchHit]) -> String {
    let mut out = String::from("Web Sources:\n");
    for (i, hit) in hits.iter().enumerate() {
        let snippet: String = hit.content.chars().take(500).collect();
        let _ = writeln!(out, "[{}] {} ({})\n{}", i + 1, hit.title, hit.url, snippet.trim());
    }
    out
}

pub struct WebSearchFallback {
    search: Option<TavilyClient>,
    llm: Option<Arc<GeminiClient>>,
}

impl WebSearchFallback {
    pub fn new(search: Option<TavilyClient>, llm: Option<Arc<GeminiClient>>) -> Self {
        Self { search, llm }
    }
}

#[async_trait::async_trait]
impl FallbackService for WebSearchFallback {
    fn name(&self) -> &str {
        BACKEND
    }

    fn is_available(&self) -> bool {
        self.search.is_some() && self.llm.is_some()
    }

    async fn answer(&self, query: &str, partial_results: Option<&WorkerResults>) -> Result<FallbackResponse> {
        let (Some(search), Some(llm)) = (&self.search, &self.llm) else {
            return Ok(FallbackResponse::error(
                BACKEND,
                "unavailable",
                "Web search fallback not available: TAVILY_API_KEY or GEMINI_API_KEY missing",
            ));
        };

        let started = Instant::now();
        let hits = search.search(query).await?;
        if hits.is_empty() {
            warn!("Web search returned no sources");
        }

        let prompt = build_user_prompt(query, partial_results, &format_sources(&hits));
        let (answer, confidence) = llm.generate(system_prompt(), &prompt).await?;
        let references: Vec<String> = hits.into_iter().map(|h| h.url).collect();

        info!(
            sources = references.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Web search fallback answered"
        );

        Ok(FallbackResponse::success(BACKEND, llm.model(), answer, references)
            .with_confidence(confidence)
            .with_elapsed(started.elapsed().as_millis() as u64))
    }
}
