//! Governance post-check over worker results
//!
//! Rules-based checks before results are released.
//! Deterministic enforcement: the most severe failed rule decides the status.

use crate::models::{DomainPurity, EnvelopeStatus, QuarantineStatus, WorkerKind};
use crate::workers::{WorkerError, WorkerPayload, WorkerResult, WorkerResults};
use serde::Serialize;
use std::cmp::Ordering;
use tracing::info;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Blocking,
}

/// Trait for governance rules
pub trait GovernanceRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Severity if this rule fails
    fn severity(&self) -> Severity;

    fn check(&self, results: &WorkerResults) -> RuleOutcome;
}

pub struct RuleOutcome {
    pub passed: bool,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GovernanceCheck {
    pub rule_name: String,
    pub passed: bool,
    pub details: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GovernanceVerdict {
    pub status: EnvelopeStatus,
    pub issues: Vec<String>,
    pub checks: Vec<GovernanceCheck>,
}

impl GovernanceVerdict {
    pub fn is_blocked(&self) -> bool {
        self.status == EnvelopeStatus::Blocked
    }
}

/// Governance engine that enforces rules
pub struct GovernanceEngine {
    rules: Vec<Box<dyn GovernanceRule>>,
}

impl GovernanceEngine {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn add_rule(&mut self, rule: Box<dyn GovernanceRule>) {
        self.rules.push(rule);
    }

    pub fn check_governance(&self, results: &WorkerResults) -> GovernanceVerdict {
        let mut checks = Vec::with_capacity(self.rules.len());
        let mut issues = Vec::new();
        let mut worst = Severity::Info;

        for rule in &self.rules {
            let outcome = rule.check(results);

            if !outcome.passed {
                issues.push(format!("{}: {}", rule.name(), outcome.details));
                worst = std::cmp::max(worst, rule.severity());
            }

            checks.push(GovernanceCheck {
                rule_name: rule.name().to_string(),
                passed: outcome.passed,
                details: outcome.details,
            });
        }

        let status = match worst {
            Severity::Blocking => EnvelopeStatus::Blocked,
            Severity::Warning => EnvelopeStatus::ApprovedWithWarnings,
            Severity::Info => EnvelopeStatus::Approved,
        };

        info!(
            rule_count = self.rules.len(),
            status = ?status,
            issues = issues.len(),
            "Governance check completed"
        );

        GovernanceVerdict {
            status,
            issues,
            checks,
        }
    }
}

impl Default for GovernanceEngine {
    fn default() -> Self {
        Self::new()
    }
}

//
// ================= Severity Ordering =================
//

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl Severity {
    fn rank(&self) -> u8 {
        match self {
            Severity::Info => 0,
            Severity::Warning => 1,
            Severity::Blocking => 2,
        }
    }
}

/// First blocking worker error, in worker order
pub fn first_blocking(results: &WorkerResults) -> Option<(WorkerKind, &WorkerError)> {
    results.iter().find_map(|(kind, result)| {
        result
            .error()
            .filter(|err| err.is_blocking())
            .map(|err| (*kind, err))
    })
}

//
// ================= Rules =================
//

/// Rule: no worker may report a timelock or contamination error
pub struct BlockingErrorRule;

impl GovernanceRule for BlockingErrorRule {
    fn name(&self) -> &'static str {
        "no_blocking_errors"
    }

    fn severity(&self) -> Severity {
        Severity::Blocking
    }

    fn check(&self, results: &WorkerResults) -> RuleOutcome {
        match first_blocking(results) {
            Some((kind, err)) => RuleOutcome {
                passed: false,
                details: format!("{} reported {}: {}", kind, err.status, err.message),
            },
            None => RuleOutcome {
                passed: true,
                details: "No blocking errors".to_string(),
            },
        }
    }
}

/// Rule: no worker output may carry a failed domain purity check
pub struct DomainPurityRule;

impl GovernanceRule for DomainPurityRule {
    fn name(&self) -> &'static str {
        "domain_purity"
    }

    fn severity(&self) -> Severity {
        Severity::Blocking
    }

    fn check(&self, results: &WorkerResults) -> RuleOutcome {
        let failed: Vec<String> = results
            .iter()
            .filter(|(_, r)| r.governance().is_some_and(|g| g.domain_purity == DomainPurity::Failed))
            .map(|(k, _)| k.to_string())
            .collect();

        RuleOutcome {
            passed: failed.is_empty(),
            details: if failed.is_empty() {
                "Domain purity intact".to_string()
            } else {
                format!("Domain purity failed for {}", failed.join(", "))
            },
        }
    }
}

/// Rule: quarantined data is retained but labelled
pub struct QuarantineRule;

impl QuarantineRule {
    fn quarantined(result: &WorkerResult) -> usize {
        let overall = usize::from(result.quarantine_status() != QuarantineStatus::Clean);
        let articles = match result.output().map(|o| &o.payload) {
            Some(WorkerPayload::NewsAnalysis(analysis)) => analysis
                .individual_articles
                .iter()
                .filter(|a| a.quarantine_status != QuarantineStatus::Clean)
                .count(),
            _ => 0,
        };
        overall + articles
    }
}

impl GovernanceRule for QuarantineRule {
    fn name(&self) -> &'static str {
        "quarantine_clean"
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn check(&self, results: &WorkerResults) -> RuleOutcome {
        let flagged: Vec<String> = results
            .iter()
            .filter_map(|(kind, result)| {
                let count = Self::quarantined(result);
                (count > 0).then(|| format!("{} ({} quarantined, overall {:?})", kind, count, result.quarantine_status()))
            })
            .collect();

        RuleOutcome {
            passed: flagged.is_empty(),
            details: if flagged.is_empty() {
                "All data clean".to_string()
            } else {
                format!("Quarantined data present: {}", flagged.join("; "))
            },
        }
    }
}

/// Create a governance engine with the standard rules
pub fn create_default_governance_engine() -> GovernanceEngine {
    let mut engine = GovernanceEngine::new();
    engine.add_rule(Box::new(BlockingErrorRule));
    engine.add_rule(Box::new(DomainPurityRule));
    engine.add_rule(Box::new(QuarantineRule));
    engine
}
