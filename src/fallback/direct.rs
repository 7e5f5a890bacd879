//! Secondary fallback: direct LLM answer over partial worker data

use super::{build_user_prompt, system_prompt, FallbackResponse, FallbackService};
use crate::gemini::GeminiClient;
use crate::workers::WorkerResults;
use crate::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

const BACKEND: &str = "direct_llm";

pub struct DirectLlmFallback {
    llm: Option<Arc<GeminiClient>>,
}

impl DirectLlmFallback {
    pub fn new(llm: Option<Arc<GeminiClient>>) -> Self {
        Self { llm }
    }
}

#[async_trait::async_trait]
impl FallbackService for DirectLlmFallback {
    fn name(&self) -> &str {
        BACKEND
    }

    fn is_available(&self) -> bool {
        self.llm.is_some()
    }

    async fn answer(&self, query: &str, partial_results: Option<&WorkerResults>) -> Result<FallbackResponse> {
        let Some(llm) = &self.llm else {
            return Ok(FallbackResponse::error(
                BACKEND,
                "unavailable",
                "Direct LLM fallback not available: GEMINI_API_KEY missing",
            ));
        };

        let started = Instant::now();
        let prompt = build_user_prompt(query, partial_results, "");
        let (answer, confidence) = llm.generate(system_prompt(), &prompt).await?;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            with_partial_data = partial_results.is_some_and(|r| !r.is_empty()),
            "Direct LLM fallback answered"
        );

        Ok(FallbackResponse::success(BACKEND, llm.model(), answer, vec![])
            .with_confidence(confidence)
            .with_elapsed(started.elapsed().as_millis() as u64))
    }
}
