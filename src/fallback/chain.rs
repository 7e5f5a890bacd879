//! Ordered fallback chain with promotion on failure

use super::{FallbackResponse, FallbackService};
use crate::error::OrchestrationError;
use crate::workers::WorkerResults;
use crate::Result;
use std::sync::Arc;
use tracing::{info, warn};

pub struct ChainFallback {
    backends: Vec<Arc<dyn FallbackService>>,
}

impl ChainFallback {
    pub fn new(backends: Vec<Arc<dyn FallbackService>>) -> Self {
        Self { backends }
    }
}

#[async_trait::async_trait]
impl FallbackService for ChainFallback {
    fn name(&self) -> &str {
        "chain"
    }

    fn is_available(&self) -> bool {
        self.backends.iter().any(|b| b.is_available())
    }

    async fn answer(&self, query: &str, partial_results: Option<&WorkerResults>) -> Result<FallbackResponse> {
        let mut failures = Vec::new();

        for backend in &self.backends {
            if !backend.is_available() {
                failures.push(format!("{}: unavailable", backend.name()));
                continue;
            }

            match backend.answer(query, partial_results).await {
                Ok(response) if response.is_success() => {
                    info!(backend = backend.name(), "Fallback chain answered");
                    return Ok(response);
                }
                Ok(response) => {
                    let message = response.message.unwrap_or_else(|| "unknown error".to_string());
                    warn!(backend = backend.name(), error = %message, "Fallback backend failed, promoting next");
                    failures.push(format!("{}: {}", backend.name(), message));
                }
                Err(e) => {
                    warn!(backend = backend.name(), error = %e, "Fallback backend failed, promoting next");
                    let message = match e {
                        OrchestrationError::FallbackError(message) => message,
                        other => other.to_string(),
                    };
                    failures.push(format!("{}: {}", backend.name(), message));
                }
            }
        }

        Ok(FallbackResponse::error(
            "chain",
            "none",
            format!("All fallback backends failed ({})", failures.join("; ")),
        ))
    }
}
