//! Worker trait, results and registry
//!
//! Workers fetch one slice of data (macro, prices, fundamentals, news) for an
//! execution context. They never fail out-of-band: every outcome, including
//! errors, is a [`WorkerResult`] keyed by [`WorkerKind`].

pub mod error;
pub mod http;
pub mod mock;
pub mod payload;

pub use error::{WorkerError, WorkerErrorStatus};
pub use http::{create_http_registry, HttpWorker};
pub use mock::StaticWorker;
pub use payload::*;

use crate::context::ExecutionContext;
use crate::models::{GovernanceMetadata, QuarantineStatus, WorkerKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Named result map produced by one execution
pub type WorkerResults = BTreeMap<WorkerKind, WorkerResult>;

/// Degraded statuses reported by the data service
pub const DEGRADED_STATUSES: &[&str] = &["no_symbols", "no_companies", "no_content", "no_results"];

/// `success` or a named degraded status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WorkerStatus {
    Success,
    Degraded(String),
}

impl From<String> for WorkerStatus {
    fn from(value: String) -> Self {
        if value == "success" {
            WorkerStatus::Success
        } else {
            WorkerStatus::Degraded(value)
        }
    }
}

impl From<WorkerStatus> for String {
    fn from(value: WorkerStatus) -> Self {
        match value {
            WorkerStatus::Success => "success".to_string(),
            WorkerStatus::Degraded(status) => status,
        }
    }
}

impl fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerStatus::Success => f.write_str("success"),
            WorkerStatus::Degraded(status) => f.write_str(status),
        }
    }
}

/// Successful (possibly degraded) worker output
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerOutput {
    pub status: WorkerStatus,
    pub payload: WorkerPayload,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub governance: Option<GovernanceMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WorkerResult {
    Output(WorkerOutput),
    Error(WorkerError),
}

impl WorkerResult {
    pub fn success(payload: WorkerPayload) -> Self {
        WorkerResult::Output(WorkerOutput {
            status: WorkerStatus::Success,
            payload,
            governance: None,
        })
    }

    pub fn degraded(status: impl Into<String>) -> Self {
        WorkerResult::Output(WorkerOutput {
            status: WorkerStatus::Degraded(status.into()),
            payload: WorkerPayload::Empty,
            governance: None,
        })
    }

    pub fn with_governance(self, governance: GovernanceMetadata) -> Self {
        match self {
            WorkerResult::Output(mut output) => {
                output.governance = Some(governance);
                WorkerResult::Output(output)
            }
            error => error,
        }
    }

    pub fn output(&self) -> Option<&WorkerOutput> {
        match self {
            WorkerResult::Output(output) => Some(output),
            WorkerResult::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&WorkerError> {
        match self {
            WorkerResult::Error(err) => Some(err),
            WorkerResult::Output(_) => None,
        }
    }

    /// Output with status `success` (degraded outputs excluded)
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            WorkerResult::Output(WorkerOutput {
                status: WorkerStatus::Success,
                ..
            })
        )
    }

    pub fn is_blocking(&self) -> bool {
        self.error().is_some_and(WorkerError::is_blocking)
    }

    pub fn governance(&self) -> Option<&GovernanceMetadata> {
        self.output().and_then(|o| o.governance.as_ref())
    }

    pub fn quarantine_status(&self) -> QuarantineStatus {
        self.governance()
            .map(|g| g.quarantine_status)
            .unwrap_or_default()
    }

    /// Short label for logs: `success`, a degraded status or an error tag
    pub fn label(&self) -> String {
        match self {
            WorkerResult::Output(output) => output.status.to_string(),
            WorkerResult::Error(err) => err.status.to_string(),
        }
    }
}

impl From<WorkerError> for WorkerResult {
    fn from(err: WorkerError) -> Self {
        WorkerResult::Error(err)
    }
}

/// A single independently failing data fetcher
#[async_trait::async_trait]
pub trait Worker: Send + Sync {
    fn kind(&self) -> WorkerKind;

    /// Fetch data for the context; errors are returned as `WorkerResult::Error`
    async fn fetch(&self, context: &ExecutionContext) -> WorkerResult;
}

/// Worker registry for looking up workers by kind
#[derive(Clone)]
pub struct WorkerRegistry {
    workers: HashMap<WorkerKind, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self {
            workers: HashMap::new(),
        }
    }

    pub fn register(&mut self, worker: Arc<dyn Worker>) {
        self.workers.insert(worker.kind(), worker);
    }

    pub fn with(mut self, worker: Arc<dyn Worker>) -> Self {
        self.register(worker);
        self
    }

    pub fn get(&self, kind: WorkerKind) -> Option<Arc<dyn Worker>> {
        self.workers.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<WorkerKind> {
        let mut kinds: Vec<_> = self.workers.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_wire_format() {
        let result = WorkerResult::degraded("no_symbols");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["outcome"], "output");
        assert_eq!(value["status"], "no_symbols");
        assert!(!result.is_success());

        let ok = WorkerResult::success(WorkerPayload::Empty);
        assert_eq!(serde_json::to_value(&ok).unwrap()["status"], json!("success"));
        assert!(ok.is_success());
    }

    #[test]
    fn test_governance_ignored_on_errors() {
        let err: WorkerResult = WorkerError::network(WorkerKind::Prices, "down").into();
        let err = err.with_governance(GovernanceMetadata::default());
        assert!(err.governance().is_none());
        assert_eq!(err.quarantine_status(), QuarantineStatus::Clean);
        assert_eq!(err.label(), "NETWORK_ERROR");
    }

    #[test]
    fn test_registry_keys_by_kind() {
        let registry = WorkerRegistry::new()
            .with(Arc::new(StaticWorker::new(
                WorkerKind::News,
                WorkerResult::degraded("no_results"),
            )))
            .with(Arc::new(StaticWorker::new(
                WorkerKind::Macro,
                WorkerResult::degraded("no_results"),
            )));

        assert_eq!(registry.kinds(), vec![WorkerKind::Macro, WorkerKind::News]);
        assert!(registry.get(WorkerKind::Prices).is_none());
    }
}
