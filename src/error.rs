//! Error types for the financial intelligence engine

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[derive(Error, Debug)]
pub enum OrchestrationError {

    // =============================
    // Blocking Governance Errors
    // =============================

    #[error("Timelock violation: {0}")]
    TimelockViolation(String),

    #[error("Domain contamination: {0}")]
    DomainContamination(String),

    #[error("Contamination detected: {0}")]
    ContaminationDetected(String),

    // =============================
    // Core Pipeline Errors
    // =============================

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Worker error: {0}")]
    WorkerError(String),

    #[error("Fallback error: {0}")]
    FallbackError(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Audit error: {0}")]
    AuditError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl OrchestrationError {
    /// Errors that must halt the request with a BLOCKED status instead of
    /// merely lowering confidence.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            OrchestrationError::TimelockViolation(_)
                | OrchestrationError::DomainContamination(_)
                | OrchestrationError::ContaminationDetected(_)
        )
    }

    /// Wire tag used in result envelopes
    pub fn error_type(&self) -> &'static str {
        match self {
            OrchestrationError::TimelockViolation(_) => "TIMELOCK_VIOLATION",
            OrchestrationError::DomainContamination(_) => "DOMAIN_CONTAMINATION",
            OrchestrationError::ContaminationDetected(_) => "CONTAMINATION_DETECTED",
            OrchestrationError::InvalidPlan(_) => "INVALID_PLAN",
            OrchestrationError::WorkerError(_) => "WORKER_ERROR",
            OrchestrationError::FallbackError(_) => "FALLBACK_ERROR",
            OrchestrationError::LlmError(_) => "LLM_ERROR",
            OrchestrationError::ConfigError(_) => "CONFIG_ERROR",
            OrchestrationError::AuditError(_) => "AUDIT_ERROR",
            OrchestrationError::Unknown(_) => "UNKNOWN_ERROR",
            OrchestrationError::SerializationError(_) => "SERIALIZATION_ERROR",
            OrchestrationError::HttpError(_) => "HTTP_ERROR",
            OrchestrationError::IoError(_) => "IO_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_classification() {
        assert!(OrchestrationError::TimelockViolation("x".into()).is_blocking());
        assert!(OrchestrationError::DomainContamination("x".into()).is_blocking());
        assert!(OrchestrationError::ContaminationDetected("x".into()).is_blocking());
        assert!(!OrchestrationError::FallbackError("x".into()).is_blocking());
        assert!(!OrchestrationError::InvalidPlan("x".into()).is_blocking());
    }

    #[test]
    fn test_error_type_tags() {
        assert_eq!(
            OrchestrationError::TimelockViolation("late".into()).error_type(),
            "TIMELOCK_VIOLATION"
        );
        assert_eq!(
            OrchestrationError::InvalidPlan("bad".into()).to_string(),
            "Invalid plan: bad"
        );
    }
}
