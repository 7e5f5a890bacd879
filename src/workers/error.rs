//! Uniform worker error vocabulary

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::OrchestrationError;
use crate::models::WorkerKind;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerErrorStatus {
    DataUnavailable,
    NetworkError,
    ValidationError,
    TimeoutError,
    RateLimitError,
    AuthenticationError,
    ParseError,
    TimelockViolation,
    DomainContamination,
    ContaminationDetected,
    UnverifiableSource,
    ForwardLookingDetected,
}

impl WorkerErrorStatus {
    pub const ALL: [WorkerErrorStatus; 12] = [
        WorkerErrorStatus::DataUnavailable,
        WorkerErrorStatus::NetworkError,
        WorkerErrorStatus::ValidationError,
        WorkerErrorStatus::TimeoutError,
        WorkerErrorStatus::RateLimitError,
        WorkerErrorStatus::AuthenticationError,
        WorkerErrorStatus::ParseError,
        WorkerErrorStatus::TimelockViolation,
        WorkerErrorStatus::DomainContamination,
        WorkerErrorStatus::ContaminationDetected,
        WorkerErrorStatus::UnverifiableSource,
        WorkerErrorStatus::ForwardLookingDetected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerErrorStatus::DataUnavailable => "DATA_UNAVAILABLE",
            WorkerErrorStatus::NetworkError => "NETWORK_ERROR",
            WorkerErrorStatus::ValidationError => "VALIDATION_ERROR",
            WorkerErrorStatus::TimeoutError => "TIMEOUT_ERROR",
            WorkerErrorStatus::RateLimitError => "RATE_LIMIT_ERROR",
            WorkerErrorStatus::AuthenticationError => "AUTHENTICATION_ERROR",
            WorkerErrorStatus::ParseError => "PARSE_ERROR",
            WorkerErrorStatus::TimelockViolation => "TIMELOCK_VIOLATION",
            WorkerErrorStatus::DomainContamination => "DOMAIN_CONTAMINATION",
            WorkerErrorStatus::ContaminationDetected => "CONTAMINATION_DETECTED",
            WorkerErrorStatus::UnverifiableSource => "UNVERIFIABLE_SOURCE",
            WorkerErrorStatus::ForwardLookingDetected => "FORWARD_LOOKING_DETECTED",
        }
    }

    /// Lookup by wire tag, used when a remote service reports `error_type`
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_uppercase();
        Self::ALL.into_iter().find(|status| status.as_str() == tag)
    }

    /// Transient failures worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WorkerErrorStatus::NetworkError
                | WorkerErrorStatus::TimeoutError
                | WorkerErrorStatus::RateLimitError
                | WorkerErrorStatus::AuthenticationError
        )
    }

    /// Governance violations that halt the whole request
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            WorkerErrorStatus::TimelockViolation
                | WorkerErrorStatus::DomainContamination
                | WorkerErrorStatus::ContaminationDetected
        )
    }
}

impl fmt::Display for WorkerErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerError {
    pub status: WorkerErrorStatus,
    pub message: String,
    pub worker: WorkerKind,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub retry_count: u32,
}

impl WorkerError {
    pub fn new(worker: WorkerKind, status: WorkerErrorStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            worker,
            metadata: serde_json::Map::new(),
            timestamp: Utc::now(),
            retry_count: 0,
        }
    }

    pub fn network(worker: WorkerKind, message: impl Into<String>) -> Self {
        Self::new(worker, WorkerErrorStatus::NetworkError, message)
    }

    pub fn timeout(worker: WorkerKind, message: impl Into<String>) -> Self {
        Self::new(worker, WorkerErrorStatus::TimeoutError, message)
    }

    pub fn parse(worker: WorkerKind, message: impl Into<String>) -> Self {
        Self::new(worker, WorkerErrorStatus::ParseError, message)
    }

    pub fn unavailable(worker: WorkerKind, message: impl Into<String>) -> Self {
        Self::new(worker, WorkerErrorStatus::DataUnavailable, message)
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.status.is_retryable()
    }

    pub fn is_blocking(&self) -> bool {
        self.status.is_blocking()
    }

    /// Lift into the engine error type; blocking statuses keep their variant
    pub fn to_orchestration_error(&self) -> OrchestrationError {
        let detail = format!("[{}] {}", self.worker, self.message);
        match self.status {
            WorkerErrorStatus::TimelockViolation => OrchestrationError::TimelockViolation(detail),
            WorkerErrorStatus::DomainContamination => OrchestrationError::DomainContamination(detail),
            WorkerErrorStatus::ContaminationDetected => {
                OrchestrationError::ContaminationDetected(detail)
            }
            _ => OrchestrationError::WorkerError(format!("{}: {}", self.status, detail)),
        }
    }
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.worker, self.status, self.message)
    }
}

impl std::error::Error for WorkerError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_and_blocking_sets() {
        let retryable: Vec<_> = WorkerErrorStatus::ALL
            .into_iter()
            .filter(|s| s.is_retryable())
            .collect();
        assert_eq!(
            retryable,
            vec![
                WorkerErrorStatus::NetworkError,
                WorkerErrorStatus::TimeoutError,
                WorkerErrorStatus::RateLimitError,
                WorkerErrorStatus::AuthenticationError,
            ]
        );

        let blocking: Vec<_> = WorkerErrorStatus::ALL
            .into_iter()
            .filter(|s| s.is_blocking())
            .collect();
        assert_eq!(
            blocking,
            vec![
                WorkerErrorStatus::TimelockViolation,
                WorkerErrorStatus::DomainContamination,
                WorkerErrorStatus::ContaminationDetected,
            ]
        );
    }

    #[test]
    fn test_tag_lookup() {
        assert_eq!(
            WorkerErrorStatus::from_tag("domain_contamination"),
            Some(WorkerErrorStatus::DomainContamination)
        );
        assert_eq!(WorkerErrorStatus::from_tag("SOMETHING_ELSE"), None);
    }

    #[test]
    fn test_blocking_error_lifts_to_blocking_variant() {
        let err = WorkerError::new(
            WorkerKind::News,
            WorkerErrorStatus::ContaminationDetected,
            "sports article",
        )
        .with_metadata("article", 3);

        assert!(err.is_blocking());
        assert!(err.to_orchestration_error().is_blocking());
        assert_eq!(err.metadata["article"], 3);

        let soft = WorkerError::timeout(WorkerKind::Macro, "30s elapsed");
        assert!(soft.is_retryable());
        assert!(!soft.to_orchestration_error().is_blocking());
    }
}
