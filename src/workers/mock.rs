//! Static worker for tests and offline runs

use super::{Worker, WorkerResult};
use crate::context::ExecutionContext;
use crate::models::WorkerKind;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Returns a canned result, optionally after a delay or by panicking
pub struct StaticWorker {
    kind: WorkerKind,
    result: WorkerResult,
    delay: Option<Duration>,
    panic_message: Option<String>,
    calls: AtomicUsize,
}

impl StaticWorker {
    pub fn new(kind: WorkerKind, result: WorkerResult) -> Self {
        Self {
            kind,
            result,
            delay: None,
            panic_message: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Simulate an uncaught failure inside the worker task
    pub fn panicking(kind: WorkerKind, message: impl Into<String>) -> Self {
        let mut worker = Self::new(kind, WorkerResult::degraded("no_results"));
        worker.panic_message = Some(message.into());
        worker
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Worker for StaticWorker {
    fn kind(&self) -> WorkerKind {
        self.kind
    }

    async fn fetch(&self, _context: &ExecutionContext) -> WorkerResult {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = &self.panic_message {
            panic!("{}", message);
        }

        self.result.clone()
    }
}
