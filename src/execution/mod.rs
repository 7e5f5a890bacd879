//! Concurrent execution coordinator
//!
//! Fans a context out to the workers its intent selects, one task per worker,
//! and fans the results back into a named map. A failure in one task never
//! aborts its siblings. When news succeeds, a second-stage analysis runs on a
//! blocking thread and adds a `NEWS_ANALYSIS` entry.

use crate::context::ExecutionContext;
use crate::models::WorkerKind;
use crate::news::NewsAnalyzer;
use crate::policy::Policy;
use crate::workers::{
    NewsPayload, WorkerError, WorkerErrorStatus, WorkerOutput, WorkerPayload, WorkerRegistry,
    WorkerResult, WorkerResults, WorkerStatus,
};
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

pub struct ExecutionCoordinator {
    registry: WorkerRegistry,
    policy: Arc<Policy>,
    analyzer: Arc<dyn NewsAnalyzer>,
    deadline: Option<Duration>,
}

impl ExecutionCoordinator {
    pub fn new(registry: WorkerRegistry, policy: Arc<Policy>, analyzer: Arc<dyn NewsAnalyzer>) -> Self {
        debug!(workers = ?registry.kinds(), "Execution coordinator ready");
        Self {
            registry,
            policy,
            analyzer,
            deadline: None,
        }
    }

    /// Parent deadline for the worker batch; late workers become TIMEOUT_ERROR
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Workers the policy selects for this context's intent
    pub fn select_workers(&self, context: &ExecutionContext) -> Vec<WorkerKind> {
        self.policy.workers_for(context.intent()).to_vec()
    }

    /// Run every selected worker concurrently and collect the named results
    pub async fn execute(&self, context: Arc<ExecutionContext>) -> WorkerResults {
        let selected = self.select_workers(&context);
        let mut results = WorkerResults::new();

        if selected.is_empty() {
            info!(intent = %context.intent(), "No workers mapped for intent");
            return results;
        }

        let started = Instant::now();
        let deadline_at = self
            .deadline
            .map(|d| tokio::time::Instant::now() + d);

        info!(
            intent = %context.intent(),
            workers = ?selected,
            deadline_ms = self.deadline.map(|d| d.as_millis() as u64),
            "Launching workers"
        );

        let mut handles: Vec<(WorkerKind, JoinHandle<WorkerResult>)> = Vec::with_capacity(selected.len());

        for kind in selected {
            match self.registry.get(kind) {
                Some(worker) => {
                    let ctx = Arc::clone(&context);
                    let handle = tokio::spawn(async move { worker.fetch(&ctx).await });
                    handles.push((kind, handle));
                }
                None => {
                    warn!(worker = %kind, "Worker not registered");
                    results.insert(
                        kind,
                        WorkerError::unavailable(kind, "Worker not registered").into(),
                    );
                }
            }
        }

        for (kind, handle) in handles {
            let result = match join_with_deadline(kind, handle, deadline_at).await {
                Ok(result) => result,
                Err(err) => WorkerResult::Error(err),
            };

            match &result {
                WorkerResult::Output(output) => {
                    debug!(worker = %kind, status = %output.status, "Worker completed");
                }
                WorkerResult::Error(err) => {
                    warn!(
                        worker = %kind,
                        status = %err.status,
                        blocking = err.is_blocking(),
                        error = %err.message,
                        "Worker failed"
                    );
                }
            }

            results.insert(kind, result);
        }

        let news_payload = results
            .get(&WorkerKind::News)
            .filter(|r| r.is_success())
            .map(|news| match news.output().map(|o| &o.payload) {
                Some(WorkerPayload::News(payload)) => payload.clone(),
                _ => NewsPayload::default(),
            });

        if let Some(payload) = news_payload {
            let analysis = self.analyze_news(payload, Arc::clone(&context), deadline_at).await;
            results.insert(WorkerKind::NewsAnalysis, analysis);
        }

        info!(
            workers = results.len(),
            failed = results.values().filter(|r| r.error().is_some()).count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Worker batch completed"
        );

        results
    }

    async fn analyze_news(
        &self,
        payload: NewsPayload,
        context: Arc<ExecutionContext>,
        deadline_at: Option<tokio::time::Instant>,
    ) -> WorkerResult {
        let analyzer = Arc::clone(&self.analyzer);
        let handle = tokio::task::spawn_blocking(move || analyzer.analyze(&payload, &context));

        match join_with_deadline(WorkerKind::NewsAnalysis, handle, deadline_at).await {
            Ok(Ok(output)) => WorkerResult::Output(WorkerOutput {
                status: WorkerStatus::from(output.status),
                payload: WorkerPayload::NewsAnalysis(output.analysis),
                governance: Some(output.governance),
            }),
            Ok(Err(err)) | Err(err) => {
                warn!(status = %err.status, error = %err.message, "News analysis failed");
                WorkerResult::Error(err)
            }
        }
    }
}

async fn join_with_deadline<T>(
    kind: WorkerKind,
    mut handle: JoinHandle<T>,
    deadline_at: Option<tokio::time::Instant>,
) -> Result<T, WorkerError> {
    let joined = match deadline_at {
        Some(at) => match tokio::time::timeout_at(at, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                handle.abort();
                return Err(WorkerError::timeout(kind, "Worker exceeded the request deadline")
                    .with_metadata("synthetic", true));
            }
        },
        None => handle.await,
    };

    joined.map_err(|e| join_failure(kind, e))
}

/// A panicked or cancelled task becomes a NETWORK_ERROR entry
fn join_failure(kind: WorkerKind, err: JoinError) -> WorkerError {
    let message = if err.is_panic() {
        format!("Worker task panicked: {}", panic_message(err.into_panic()))
    } else {
        "Worker task was cancelled".to_string()
    };
    WorkerError::new(kind, WorkerErrorStatus::NetworkError, message)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextBuilder;
    use crate::models::{Intent, QueryPlan};
    use crate::news::RuleBasedNewsAnalyzer;
    use crate::workers::{Article, MacroPayload, StaticWorker};

    fn coordinator(registry: WorkerRegistry) -> ExecutionCoordinator {
        ExecutionCoordinator::new(
            registry,
            Arc::new(Policy::default()),
            Arc::new(RuleBasedNewsAnalyzer),
        )
    }

    fn context(intent: Intent) -> Arc<ExecutionContext> {
        Arc::new(
            ContextBuilder::default()
                .build(&QueryPlan::new(intent, "test query"))
                .unwrap(),
        )
    }

    fn news_worker(articles: Vec<Article>) -> Arc<StaticWorker> {
        Arc::new(StaticWorker::new(
            WorkerKind::News,
            WorkerResult::success(WorkerPayload::News(NewsPayload { articles })),
        ))
    }

    #[tokio::test]
    async fn test_selection_matches_policy_for_every_intent() {
        let policy = Policy::default();
        let coordinator = coordinator(WorkerRegistry::new());

        for intent in Intent::ALL {
            assert_eq!(
                coordinator.select_workers(&context(intent)),
                policy.workers_for(intent).to_vec()
            );
        }
    }

    #[tokio::test]
    async fn test_empty_selection_returns_empty_map() {
        let macro_worker = Arc::new(StaticWorker::new(
            WorkerKind::Macro,
            WorkerResult::degraded("no_results"),
        ));
        let registry = WorkerRegistry::new().with(macro_worker.clone());

        let results = coordinator(registry)
            .execute(context(Intent::CompanyFundamentals))
            .await;

        assert!(results.is_empty());
        assert_eq!(macro_worker.calls(), 0);
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let registry = WorkerRegistry::new()
            .with(Arc::new(StaticWorker::panicking(WorkerKind::Macro, "scraper exploded")))
            .with(news_worker(vec![]));

        let results = coordinator(registry).execute(context(Intent::MacroData)).await;

        let macro_err = results[&WorkerKind::Macro].error().unwrap();
        assert_eq!(macro_err.status, WorkerErrorStatus::NetworkError);
        assert!(macro_err.message.contains("scraper exploded"));
        assert!(results[&WorkerKind::News].is_success());
    }

    #[tokio::test]
    async fn test_news_with_zero_articles_yields_no_content_analysis() {
        let registry = WorkerRegistry::new().with(news_worker(vec![]));
        let results = coordinator(registry).execute(context(Intent::NewsAnalysis)).await;

        let analysis = results[&WorkerKind::NewsAnalysis].output().unwrap();
        assert_eq!(analysis.status, WorkerStatus::Degraded("no_content".into()));
    }

    #[tokio::test]
    async fn test_failed_news_skips_analysis() {
        let registry = WorkerRegistry::new().with(Arc::new(StaticWorker::new(
            WorkerKind::News,
            WorkerError::network(WorkerKind::News, "down").into(),
        )));
        let results = coordinator(registry).execute(context(Intent::NewsAnalysis)).await;

        assert!(results.contains_key(&WorkerKind::News));
        assert!(!results.contains_key(&WorkerKind::NewsAnalysis));
    }

    #[tokio::test]
    async fn test_unregistered_worker_is_data_unavailable() {
        let results = coordinator(WorkerRegistry::new())
            .execute(context(Intent::MarketPrices))
            .await;

        assert_eq!(
            results[&WorkerKind::Prices].error().map(|e| e.status),
            Some(WorkerErrorStatus::DataUnavailable)
        );
    }

    #[tokio::test]
    async fn test_deadline_times_out_slow_worker_only() {
        let registry = WorkerRegistry::new()
            .with(Arc::new(
                StaticWorker::new(
                    WorkerKind::Macro,
                    WorkerResult::success(WorkerPayload::Macro(MacroPayload::default())),
                )
                .with_delay(Duration::from_secs(5)),
            ))
            .with(news_worker(vec![]));

        let results = coordinator(registry)
            .with_deadline(Some(Duration::from_millis(100)))
            .execute(context(Intent::MacroData))
            .await;

        assert_eq!(
            results[&WorkerKind::Macro].error().map(|e| e.status),
            Some(WorkerErrorStatus::TimeoutError)
        );
        assert!(results[&WorkerKind::News].is_success());
    }
}
