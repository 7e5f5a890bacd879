//! Static fallback for tests and offline runs

use super::{FallbackResponse, FallbackService};
use crate::error::OrchestrationError;
use crate::models::WorkerKind;
use crate::workers::WorkerResults;
use crate::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

enum Behaviour {
    Answer(String),
    Fail(String),
    Unavailable,
}

/// Canned fallback that records what it was asked
pub struct StaticFallback {
    name: String,
    behaviour: Behaviour,
    calls: AtomicUsize,
    last_partial: Mutex<Option<Vec<WorkerKind>>>,
}

impl StaticFallback {
    fn with_behaviour(name: &str, behaviour: Behaviour) -> Self {
        Self {
            name: name.to_string(),
            behaviour,
            calls: AtomicUsize::new(0),
            last_partial: Mutex::new(None),
        }
    }

    pub fn answering(name: &str, response: impl Into<String>) -> Self {
        Self::with_behaviour(name, Behaviour::Answer(response.into()))
    }

    /// Fails with a transport error on every call
    pub fn failing(name: &str, message: impl Into<String>) -> Self {
        Self::with_behaviour(name, Behaviour::Fail(message.into()))
    }

    pub fn unavailable(name: &str) -> Self {
        Self::with_behaviour(name, Behaviour::Unavailable)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Worker keys passed as partial results on the most recent call
    pub fn last_partial(&self) -> Option<Vec<WorkerKind>> {
        self.last_partial.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait::async_trait]
impl FallbackService for StaticFallback {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_available(&self) -> bool {
        !matches!(self.behaviour, Behaviour::Unavailable)
    }

    async fn answer(&self, _query: &str, partial_results: Option<&WorkerResults>) -> Result<FallbackResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut guard) = self.last_partial.lock() {
            *guard = partial_results.map(|r| r.keys().copied().collect());
        }

        match &self.behaviour {
            Behaviour::Answer(text) => Ok(FallbackResponse::success(
                &self.name,
                "static",
                text.clone(),
                vec!["https://example.com/source".to_string()],
            )),
            Behaviour::Fail(message) => Err(OrchestrationError::FallbackError(message.clone())),
            Behaviour::Unavailable => Ok(FallbackResponse::error(
                &self.name,
                "unavailable",
                format!("{} fallback not available", self.name),
            )),
        }
    }
}
