//! HTTP-backed data workers
//!
//! One `HttpWorker` per worker kind, each calling the configured data service.
//! Retryable failures are retried with exponential backoff; every call has a
//! hard timeout. Payloads are validated into typed shapes here.

use super::{
    FundamentalsPayload, MacroPayload, NewsPayload, PricesPayload, Worker, WorkerError,
    WorkerErrorStatus, WorkerOutput, WorkerPayload, WorkerRegistry, WorkerResult, WorkerStatus,
    DEGRADED_STATUSES,
};
use crate::config::{EngineConfig, RetryConfig};
use crate::context::ExecutionContext;
use crate::error::OrchestrationError;
use crate::models::{GovernanceMetadata, Timelock, WorkerKind};
use crate::Result;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Body returned by the data service for every worker endpoint
#[derive(Debug, Default, Deserialize)]
struct WireResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default, rename = "_governance")]
    governance: Option<GovernanceMetadata>,
    // Macro responses carry these at the top level
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    macro_facts: Option<Value>,
}

pub struct HttpWorker {
    kind: WorkerKind,
    client: Client,
    base_url: Option<String>,
    retry: RetryConfig,
    timeout: Duration,
}

impl HttpWorker {
    pub fn new(
        kind: WorkerKind,
        client: Client,
        base_url: Option<String>,
        retry: RetryConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            kind,
            client,
            base_url,
            retry,
            timeout,
        }
    }

    fn endpoint(&self) -> Option<&'static str> {
        match self.kind {
            WorkerKind::Macro => Some("/api/v1/workers/macro"),
            WorkerKind::Prices => Some("/api/v1/workers/prices"),
            WorkerKind::FundamentalsIn => Some("/api/v1/workers/fundamentals/in"),
            WorkerKind::FundamentalsUs => Some("/api/v1/workers/fundamentals/us"),
            WorkerKind::News => Some("/api/v1/workers/news"),
            WorkerKind::NewsAnalysis => None,
        }
    }

    fn request_body(context: &ExecutionContext) -> Value {
        let timelock = context.timelock();
        json!({
            "query": context.query(),
            "intent": context.intent(),
            "entities": context.entities(),
            "tickers": context.entities().iter().map(|e| e.ticker.as_str()).collect::<Vec<_>>(),
            "required_metrics": context.required_metrics(),
            "region_hint": context.region_hint(),
            "as_of_date": timelock.as_of_date,
            "max_allowed_date": timelock.max_allowed_date,
        })
    }

    async fn call_once(
        &self,
        base_url: &str,
        path: &str,
        context: &ExecutionContext,
    ) -> std::result::Result<WorkerOutput, WorkerError> {
        let url = format!("{}{}", base_url, path);

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&Self::request_body(context))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    WorkerError::timeout(self.kind, format!("{} timed out after {:?}", path, self.timeout))
                } else {
                    WorkerError::network(self.kind, format!("Request to {} failed: {}", path, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::new(
                self.kind,
                classify_status(status),
                format!("Data service returned {} for {}: {}", status, path, body),
            )
            .with_metadata("http_status", status.as_u16()));
        }

        let wire: WireResponse = response.json().await.map_err(|e| {
            WorkerError::parse(self.kind, format!("Invalid JSON from {}: {}", path, e))
        })?;

        parse_wire(self.kind, wire, context.timelock())
    }
}

#[async_trait::async_trait]
impl Worker for HttpWorker {
    fn kind(&self) -> WorkerKind {
        self.kind
    }

    async fn fetch(&self, context: &ExecutionContext) -> WorkerResult {
        let Some(path) = self.endpoint() else {
            return WorkerError::new(
                self.kind,
                WorkerErrorStatus::ValidationError,
                "No data service endpoint for this worker",
            )
            .into();
        };

        let Some(base_url) = self.base_url.as_deref() else {
            return WorkerError::network(self.kind, "DATA_SERVICE_URL is not configured").into();
        };

        let mut attempt = 0;
        loop {
            match self.call_once(base_url, path, context).await {
                Ok(output) => {
                    debug!(worker = %self.kind, status = %output.status, attempt, "Worker call succeeded");
                    return WorkerResult::Output(output);
                }
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        worker = %self.kind,
                        attempt = attempt + 1,
                        max_retries = self.retry.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %err.message,
                        "Retrying worker request"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return err.with_retry_count(attempt).into(),
            }
        }
    }
}

/// Map a non-success HTTP status onto the worker error vocabulary
pub fn classify_status(status: StatusCode) -> WorkerErrorStatus {
    match status.as_u16() {
        429 => WorkerErrorStatus::RateLimitError,
        401 | 403 => WorkerErrorStatus::AuthenticationError,
        408 | 504 => WorkerErrorStatus::TimeoutError,
        500..=599 => WorkerErrorStatus::NetworkError,
        _ => WorkerErrorStatus::ValidationError,
    }
}

fn parse_wire(
    kind: WorkerKind,
    wire: WireResponse,
    timelock: &Timelock,
) -> std::result::Result<WorkerOutput, WorkerError> {
    let status = wire.status.unwrap_or_else(|| "success".to_string());

    if status == "error" || wire.error_type.is_some() {
        let error_status = wire
            .error_type
            .as_deref()
            .and_then(WorkerErrorStatus::from_tag)
            .unwrap_or(WorkerErrorStatus::DataUnavailable);
        let message = wire.error.unwrap_or_else(|| "Worker reported an error".to_string());
        return Err(WorkerError::new(kind, error_status, message));
    }

    if status != "success" {
        if !DEGRADED_STATUSES.contains(&status.as_str()) {
            return Err(WorkerError::new(
                kind,
                WorkerErrorStatus::ParseError,
                format!("Unrecognised worker status '{}'", status),
            ));
        }
        return Ok(WorkerOutput {
            status: WorkerStatus::Degraded(status),
            payload: WorkerPayload::Empty,
            governance: wire.governance,
        });
    }

    let payload = match kind {
        WorkerKind::Macro => {
            let facts = wire
                .macro_facts
                .or_else(|| wire.data.get("macro_facts").cloned())
                .unwrap_or(Value::Null);
            let region = wire
                .region
                .or_else(|| wire.data.get("region").and_then(Value::as_str).map(str::to_string));
            let indicators = if facts.is_null() {
                Default::default()
            } else {
                serde_json::from_value(facts).map_err(|e| {
                    WorkerError::parse(kind, format!("Invalid macro_facts: {}", e))
                })?
            };
            WorkerPayload::Macro(MacroPayload { region, indicators })
        }
        WorkerKind::Prices => WorkerPayload::Prices(decode::<PricesPayload>(kind, wire.data)?),
        WorkerKind::FundamentalsIn | WorkerKind::FundamentalsUs => {
            WorkerPayload::Fundamentals(decode::<FundamentalsPayload>(kind, wire.data)?)
        }
        WorkerKind::News => {
            let news = decode::<NewsPayload>(kind, wire.data)?;
            WorkerPayload::News(drop_future_articles(news, timelock))
        }
        WorkerKind::NewsAnalysis => {
            return Err(WorkerError::new(
                kind,
                WorkerErrorStatus::ValidationError,
                "News analysis is derived locally, not fetched",
            ))
        }
    };

    Ok(WorkerOutput {
        status: WorkerStatus::Success,
        payload,
        governance: wire.governance,
    })
}

fn decode<T>(kind: WorkerKind, data: Value) -> std::result::Result<T, WorkerError>
where
    T: serde::de::DeserializeOwned + Default,
{
    if data.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(data).map_err(|e| WorkerError::parse(kind, format!("Invalid payload: {}", e)))
}

/// Articles dated after the timelock maximum never leave the boundary
fn drop_future_articles(mut news: NewsPayload, timelock: &Timelock) -> NewsPayload {
    let before = news.articles.len();
    news.articles.retain(|article| {
        article
            .published_date()
            .map_or(true, |date| timelock.permits(date))
    });

    let dropped = before - news.articles.len();
    if dropped > 0 {
        warn!(
            dropped,
            max_allowed_date = %timelock.max_allowed_date,
            "Dropped articles dated after timelock"
        );
    }
    news
}

/// Build a registry of HTTP workers for every fetchable worker kind
pub fn create_http_registry(config: &EngineConfig) -> Result<WorkerRegistry> {
    let client = Client::builder()
        .pool_idle_timeout(Duration::from_secs(60))
        .pool_max_idle_per_host(8)
        .timeout(config.worker_timeout())
        .build()
        .map_err(|e| OrchestrationError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

    let mut registry = WorkerRegistry::new();
    for kind in [
        WorkerKind::Macro,
        WorkerKind::Prices,
        WorkerKind::FundamentalsIn,
        WorkerKind::FundamentalsUs,
        WorkerKind::News,
    ] {
        registry.register(Arc::new(HttpWorker::new(
            kind,
            client.clone(),
            config.data_service_url.clone(),
            config.retry.clone(),
            config.worker_timeout(),
        )));
    }

    Ok(registry)
}
