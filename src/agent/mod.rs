//! Main orchestrator - implements the request pipeline
//!
//! PLAN → CONTEXT → EXECUTE → GOVERN → SCORE → ESCALATE? → ENVELOPE

use crate::audit::AuditLog;
use crate::config::EngineConfig;
use crate::confidence::ConfidenceAggregator;
use crate::context::{ContextBuilder, KeywordHeuristics};
use crate::execution::ExecutionCoordinator;
use crate::fallback::{
    build_fallback, contributing_workers, FallbackOutcome, FallbackResponse, FallbackService,
};
use crate::governance::{create_default_governance_engine, first_blocking, GovernanceEngine};
use crate::models::{EnvelopeStatus, QueryPlan, ResultEnvelope};
use crate::news::RuleBasedNewsAnalyzer;
use crate::policy::Policy;
use crate::workers::{create_http_registry, WorkerResults};
use crate::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Main orchestrator that coordinates one query end to end
pub struct Orchestrator {
    context_builder: ContextBuilder,
    coordinator: ExecutionCoordinator,
    aggregator: ConfidenceAggregator,
    governance: GovernanceEngine,
    fallback: Arc<dyn FallbackService>,
    audit_log: AuditLog,
}

impl Orchestrator {
    pub fn new(
        context_builder: ContextBuilder,
        coordinator: ExecutionCoordinator,
        aggregator: ConfidenceAggregator,
        governance: GovernanceEngine,
        fallback: Arc<dyn FallbackService>,
        audit_log: AuditLog,
    ) -> Self {
        Self {
            context_builder,
            coordinator,
            aggregator,
            governance,
            fallback,
            audit_log,
        }
    }

    /// Wire the production pipeline: HTTP workers, rule-based news analysis
    /// and the configured fallback backend
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        for warning in config.validate()? {
            warn!(warning = %warning, "Configuration warning");
        }

        let policy = Arc::new(Policy::default());
        let coordinator = ExecutionCoordinator::new(
            create_http_registry(config)?,
            Arc::clone(&policy),
            Arc::new(RuleBasedNewsAnalyzer::new()),
        )
        .with_deadline(config.request_deadline());

        Ok(Self::new(
            ContextBuilder::new(Arc::new(KeywordHeuristics)),
            coordinator,
            ConfidenceAggregator::new(policy),
            create_default_governance_engine(),
            build_fallback(config)?,
            AuditLog::with_capacity(config.audit_max_records),
        ))
    }

    pub fn audit_log(&self) -> &AuditLog {
        &self.audit_log
    }

    pub fn fallback(&self) -> &Arc<dyn FallbackService> {
        &self.fallback
    }

    /// Run one query. Never fails: every outcome is a terminal envelope.
    pub async fn run(&self, plan: QueryPlan) -> ResultEnvelope {
        let started = Instant::now();
        let request_id = Uuid::new_v4();

        info!(
            request_id = %request_id,
            intent = %plan.intent,
            entities = plan.entities.len(),
            "Orchestrator: request received"
        );

        let mut envelope = ResultEnvelope {
            request_id,
            status: EnvelopeStatus::Approved,
            query: plan.query.clone(),
            intent: plan.intent,
            context: None,
            results: WorkerResults::new(),
            workers_executed: vec![],
            confidence: None,
            fallback: None,
            reason: None,
            error_type: None,
            warnings: vec![],
            execution_time_ms: 0,
            created_at: Utc::now(),
        };

        // === CONTEXT ===
        let context = match self.context_builder.build(&plan) {
            Ok(context) => Arc::new(context),
            Err(e) => {
                warn!(request_id = %request_id, error = %e, "Context rejected");
                envelope.status = if e.is_blocking() {
                    EnvelopeStatus::Blocked
                } else {
                    EnvelopeStatus::Error
                };
                envelope.reason = Some(e.to_string());
                envelope.error_type = Some(e.error_type().to_string());
                return self.finish(envelope, started).await;
            }
        };
        envelope.context = Some(context.as_ref().clone());

        // === EXECUTE ===
        let results = self.coordinator.execute(Arc::clone(&context)).await;
        envelope.workers_executed = results.keys().copied().collect();

        if results.is_empty() {
            let trigger = format!("No workers mapped for intent {}", context.intent());
            info!(request_id = %request_id, reason = %trigger, "Fallback triggered");

            let outcome = self.escalate(context.query(), None, trigger).await;
            if outcome.failed() {
                envelope.status = EnvelopeStatus::Error;
                envelope.error_type = Some("FALLBACK_ERROR".to_string());
                envelope.reason = outcome.response.message.clone();
            } else {
                envelope.reason = Some(outcome.trigger_reason.clone());
            }
            envelope.fallback = Some(outcome);
            return self.finish(envelope, started).await;
        }

        // === GOVERN ===
        let verdict = self.governance.check_governance(&results);
        if verdict.is_blocked() {
            let (kind, err) = match first_blocking(&results) {
                Some((kind, err)) => (Some(kind), Some(err.to_orchestration_error())),
                None => (None, None),
            };
            let error_type = err.as_ref().map_or("DOMAIN_CONTAMINATION", |e| e.error_type());
            error!(
                request_id = %request_id,
                worker = ?kind,
                error_type,
                "Governance blocked request"
            );

            envelope.status = EnvelopeStatus::Blocked;
            envelope.error_type = Some(error_type.to_string());
            envelope.reason = Some(verdict.issues.join("; "));
            envelope.results = results;
            return self.finish(envelope, started).await;
        }

        // === SCORE ===
        let breakdown = self.aggregator.aggregate(
            context.intent(),
            context.planner_confidence(),
            &results,
            &context.signals(),
        );

        envelope.status = verdict.status;
        envelope.warnings.extend(verdict.issues.iter().cloned());
        if !verdict.issues.is_empty() {
            envelope.reason = Some(verdict.issues.join("; "));
        }
        if !breakdown.low_quality_workers.is_empty() {
            envelope.warnings.push(format!(
                "Below quality threshold: {}",
                breakdown
                    .low_quality_workers
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        // === ESCALATE ===
        if breakdown.decision.escalate {
            info!(
                request_id = %request_id,
                aggregate = breakdown.aggregate,
                reason = %breakdown.decision.reason,
                "Fallback triggered"
            );

            let outcome = self
                .escalate(context.query(), Some(&results), breakdown.decision.reason.clone())
                .await;

            if outcome.failed() {
                let message = outcome
                    .response
                    .message
                    .clone()
                    .unwrap_or_else(|| "Fallback failed".to_string());
                warn!(request_id = %request_id, error = %message, "Escalation failed");
                envelope.warnings.push(format!("Fallback failed: {}", message));

                // Nothing usable to release without the fallback answer
                if !results.values().any(|r| r.is_success()) {
                    envelope.status = EnvelopeStatus::Error;
                    envelope.error_type = Some("FALLBACK_ERROR".to_string());
                } else if envelope.status == EnvelopeStatus::Approved {
                    envelope.status = EnvelopeStatus::ApprovedWithWarnings;
                }
                envelope.reason = Some(message);
            } else if envelope.reason.is_none() {
                envelope.reason = Some(outcome.trigger_reason.clone());
            }
            envelope.fallback = Some(outcome);
        }

        envelope.confidence = Some(breakdown);
        envelope.results = results;
        self.finish(envelope, started).await
    }

    /// Ask the fallback service; failures become an error response
    async fn escalate(
        &self,
        query: &str,
        partial_results: Option<&WorkerResults>,
        trigger_reason: String,
    ) -> FallbackOutcome {
        let response = match self.fallback.answer(query, partial_results).await {
            Ok(response) => response,
            Err(e) => {
                warn!(backend = self.fallback.name(), error = %e, "Fallback raised");
                FallbackResponse::error(self.fallback.name(), "none", e.to_string())
            }
        };

        info!(
            backend = %response.backend,
            success = response.is_success(),
            references = response.references.len(),
            "Fallback completed"
        );

        FallbackOutcome {
            trigger_reason,
            contributing_workers: partial_results.map(contributing_workers).unwrap_or_default(),
            response,
        }
    }

    async fn finish(&self, mut envelope: ResultEnvelope, started: Instant) -> ResultEnvelope {
        envelope.execution_time_ms = started.elapsed().as_millis() as u64;

        if let Err(e) = self.audit_log.record(&envelope).await {
            warn!(request_id = %envelope.request_id, error = %e, "Audit record failed");
        }

        info!(
            request_id = %envelope.request_id,
            status = ?envelope.status,
            fallback = envelope.fallback_triggered(),
            elapsed_ms = envelope.execution_time_ms,
            "Request complete"
        );
        debug!(warnings = ?envelope.warnings, "Envelope warnings");

        envelope
    }
}
