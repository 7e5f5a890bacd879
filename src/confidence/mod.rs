//! Confidence aggregation and fallback decision
//!
//! Per-worker scores are combined per intent. Critical workers gate the
//! aggregate: any critical failure short-circuits into a penalised mean.
//! Planner confidence is reported for audit but never blended in.

pub mod validator;

use crate::context::QuerySignals;
use crate::models::{Intent, WorkerKind};
use crate::policy::Policy;
use crate::workers::WorkerResults;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WorkerScore {
    pub score: f64,
    pub reason: String,
}

impl WorkerScore {
    pub fn new(score: f64, reason: impl Into<String>) -> Self {
        Self {
            score,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Assessment {
    High,
    Acceptable,
    Low,
    VeryLow,
}

/// Escalation verdict for one request
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct FallbackDecision {
    pub escalate: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfidenceBreakdown {
    pub intent: Intent,
    pub aggregate: f64,
    pub worker_scores: BTreeMap<WorkerKind, WorkerScore>,
    pub critical_workers: Vec<WorkerKind>,
    pub critical_failures: Vec<WorkerKind>,
    pub critical_successes: Vec<WorkerKind>,
    pub penalty_applied: f64,
    pub threshold: f64,
    pub assessment: Assessment,
    /// Workers scoring below their own quality threshold
    pub low_quality_workers: Vec<WorkerKind>,
    /// Audit only; never part of the aggregate
    pub planner_confidence: f64,
    pub reason: String,
    pub decision: FallbackDecision,
}

impl ConfidenceBreakdown {
    pub fn score_of(&self, worker: WorkerKind) -> Option<f64> {
        self.worker_scores.get(&worker).map(|s| s.score)
    }
}

pub struct ConfidenceAggregator {
    policy: Arc<Policy>,
}

impl ConfidenceAggregator {
    pub fn new(policy: Arc<Policy>) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Score every entry, then combine per intent
    pub fn aggregate(
        &self,
        intent: Intent,
        planner_confidence: f64,
        results: &WorkerResults,
        query: &QuerySignals,
    ) -> ConfidenceBreakdown {
        let policy = &self.policy;

        let mut worker_scores: BTreeMap<WorkerKind, WorkerScore> = results
            .iter()
            .map(|(kind, result)| (*kind, validator::score_result(*kind, result, query)))
            .collect();

        if results.is_empty() {
            return self.finish(
                intent,
                planner_confidence,
                0.0,
                worker_scores,
                vec![],
                vec![],
                vec![],
                0.0,
                "No workers executed".to_string(),
            );
        }

        let critical_workers = policy.critical_workers(intent, results.keys().copied());
        for kind in &critical_workers {
            worker_scores
                .entry(*kind)
                .or_insert_with(|| WorkerScore::new(0.0, "Critical worker missing from result map"));
        }

        let critical_failures: Vec<WorkerKind> = critical_workers
            .iter()
            .copied()
            .filter(|k| worker_scores[k].score < policy.critical_failure_below)
            .collect();
        let critical_successes: Vec<WorkerKind> = critical_workers
            .iter()
            .copied()
            .filter(|k| worker_scores[k].score >= policy.critical_success_at)
            .collect();

        let mean = worker_scores.values().map(|s| s.score).sum::<f64>() / worker_scores.len() as f64;

        if !critical_failures.is_empty() {
            let penalty = policy.penalty_per_critical_failure * critical_failures.len() as f64;
            let aggregate = (mean - penalty).max(policy.aggregate_floor).clamp(0.0, 1.0);
            let reason = format!(
                "Critical workers below threshold: {}",
                critical_failures
                    .iter()
                    .map(WorkerKind::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            return self.finish(
                intent,
                planner_confidence,
                aggregate,
                worker_scores,
                critical_workers,
                critical_failures,
                critical_successes,
                penalty,
                reason,
            );
        }

        let aggregate = match intent {
            Intent::MacroData => {
                let macro_score = worker_scores.get(&WorkerKind::Macro).map_or(0.0, |s| s.score);
                let news_score = worker_scores.get(&WorkerKind::News).map_or(0.0, |s| s.score);
                if news_score > 0.0 {
                    policy.macro_weight * macro_score + (1.0 - policy.macro_weight) * news_score
                } else {
                    macro_score
                }
            }
            _ => mean,
        };

        self.finish(
            intent,
            planner_confidence,
            aggregate.clamp(0.0, 1.0),
            worker_scores,
            critical_workers,
            vec![],
            critical_successes,
            0.0,
            "Confidence calculated from worker data quality".to_string(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn finish(
        &self,
        intent: Intent,
        planner_confidence: f64,
        aggregate: f64,
        worker_scores: BTreeMap<WorkerKind, WorkerScore>,
        critical_workers: Vec<WorkerKind>,
        critical_failures: Vec<WorkerKind>,
        critical_successes: Vec<WorkerKind>,
        penalty_applied: f64,
        reason: String,
    ) -> ConfidenceBreakdown {
        let low_quality_workers = worker_scores
            .iter()
            .filter(|(kind, s)| {
                self.policy
                    .worker_threshold(**kind)
                    .is_some_and(|t| s.score < t)
            })
            .map(|(kind, _)| *kind)
            .collect();

        let news_analysis_score = worker_scores.get(&WorkerKind::NewsAnalysis).map(|s| s.score);
        let decision = self.should_fallback(intent, aggregate, news_analysis_score);

        info!(
            intent = %intent,
            aggregate,
            threshold = self.policy.intent_threshold(intent),
            critical_failures = critical_failures.len(),
            escalate = decision.escalate,
            "Confidence computed"
        );
        debug!(planner_confidence, ?worker_scores, "Confidence breakdown");

        ConfidenceBreakdown {
            intent,
            aggregate,
            critical_workers,
            critical_failures,
            critical_successes,
            penalty_applied,
            threshold: self.policy.intent_threshold(intent),
            assessment: self.assessment(intent, aggregate),
            low_quality_workers,
            planner_confidence,
            reason,
            decision,
            worker_scores,
        }
    }

    /// Escalate when below the intent threshold, or when a NEWS_ANALYSIS
    /// query's analysis sub-score (absent counts as zero) is under the override
    pub fn should_fallback(
        &self,
        intent: Intent,
        aggregate: f64,
        news_analysis_score: Option<f64>,
    ) -> FallbackDecision {
        let threshold = self.policy.intent_threshold(intent);

        if aggregate < threshold {
            return FallbackDecision {
                escalate: true,
                reason: format!(
                    "Confidence {:.2} below intent threshold {:.2}",
                    aggregate, threshold
                ),
            };
        }

        if intent == Intent::NewsAnalysis {
            let sub_score = news_analysis_score.unwrap_or(0.0);
            if sub_score < self.policy.news_analysis_override {
                return FallbackDecision {
                    escalate: true,
                    reason: format!(
                        "News analysis score {:.2} below {:.2}",
                        sub_score, self.policy.news_analysis_override
                    ),
                };
            }
        }

        FallbackDecision {
            escalate: false,
            reason: "Confidence acceptable".to_string(),
        }
    }

    pub fn assessment(&self, intent: Intent, aggregate: f64) -> Assessment {
        let threshold = self.policy.intent_threshold(intent);
        let band = self.policy.assessment_band;

        if aggregate >= threshold + band {
            Assessment::High
        } else if aggregate >= threshold {
            Assessment::Acceptable
        } else if aggregate >= threshold - band {
            Assessment::Low
        } else {
            Assessment::VeryLow
        }
    }
}

impl Default for ConfidenceAggregator {
    fn default() -> Self {
        Self::new(Arc::new(Policy::default()))
    }
}
