//! Governance context builder
//!
//! Converts a validated plan into the immutable execution context that every
//! downstream component reads. Temporal and domain classification happen here
//! once, so workers, scoring and governance never re-derive them.

use crate::error::OrchestrationError;
use crate::models::{DomainType, Entity, Intent, QueryPlan, Timelock};
use crate::text;
use crate::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// Planner confidence below this is logged, not rejected
const PLANNER_CONFIDENCE_WARNING: f64 = 0.3;

/// Query-text predicates supplied by the caller.
///
/// Historical-query detection and region inference are string heuristics
/// owned by whoever builds contexts; the engine only consumes the verdicts.
pub trait QueryHeuristics: Send + Sync {
    fn is_historical(&self, query: &str) -> bool;

    /// Region the query explicitly points at ("US", "IN", ...)
    fn region_hint(&self, query: &str) -> Option<String>;
}

/// Treats every query as current and region-agnostic
pub struct NoHeuristics;

impl QueryHeuristics for NoHeuristics {
    fn is_historical(&self, _query: &str) -> bool {
        false
    }

    fn region_hint(&self, _query: &str) -> Option<String> {
        None
    }
}

/// Keyword-based heuristics used by the binaries
pub struct KeywordHeuristics;

const HISTORICAL_MARKERS: &[&str] = &[
    "during", "historical", "comparison", " vs ", "versus", "compare",
    "between", "over time", "recession", "crisis", "back in", "previous",
];

const US_MARKERS: &[&str] = &["us", "u.s.", "usa", "federal reserve", "fed", "dollar"];
const INDIA_MARKERS: &[&str] = &["india", "rbi", "reserve bank of india", "rupee", "inr"];

impl QueryHeuristics for KeywordHeuristics {
    fn is_historical(&self, query: &str) -> bool {
        let lowered = query.to_lowercase();
        let mentions_year = lowered
            .split(|c: char| !c.is_ascii_digit())
            .any(|token| token.len() == 4 && (token.starts_with("19") || token.starts_with("20")));

        mentions_year || HISTORICAL_MARKERS.iter().any(|m| lowered.contains(m))
    }

    fn region_hint(&self, query: &str) -> Option<String> {
        let words = text::words(query);
        if US_MARKERS.iter().any(|m| text::mentions(&words, m)) {
            Some("US".to_string())
        } else if INDIA_MARKERS.iter().any(|m| text::mentions(&words, m)) {
            Some("IN".to_string())
        } else {
            None
        }
    }
}

/// Query text plus the caller's heuristic verdicts, as seen by the scorer
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QuerySignals {
    pub text: String,
    pub historical: bool,
    pub region_hint: Option<String>,
}

impl QuerySignals {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            historical: false,
            region_hint: None,
        }
    }
}

/// Immutable per-query context. Constructed only through [`ContextBuilder`].
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionContext {
    query: String,
    intent: Intent,
    entities: Vec<Entity>,
    timelock: Timelock,
    domain: DomainType,
    planner_confidence: f64,
    required_metrics: Vec<String>,
    historical: bool,
    region_hint: Option<String>,
}

impl ExecutionContext {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn intent(&self) -> Intent {
        self.intent
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn timelock(&self) -> &Timelock {
        &self.timelock
    }

    pub fn domain(&self) -> DomainType {
        self.domain
    }

    pub fn planner_confidence(&self) -> f64 {
        self.planner_confidence
    }

    pub fn required_metrics(&self) -> &[String] {
        &self.required_metrics
    }

    pub fn is_historical(&self) -> bool {
        self.historical
    }

    pub fn region_hint(&self) -> Option<&str> {
        self.region_hint.as_deref()
    }

    pub fn signals(&self) -> QuerySignals {
        QuerySignals {
            text: self.query.clone(),
            historical: self.historical,
            region_hint: self.region_hint.clone(),
        }
    }
}

/// Builds execution contexts from classified plans
#[derive(Clone)]
pub struct ContextBuilder {
    heuristics: Arc<dyn QueryHeuristics>,
}

impl ContextBuilder {
    pub fn new(heuristics: Arc<dyn QueryHeuristics>) -> Self {
        Self { heuristics }
    }

    /// Build the context, failing fast on an invalid timelock or confidence
    pub fn build(&self, plan: &QueryPlan) -> Result<ExecutionContext> {
        let timelock = plan.timelock.unwrap_or_else(Timelock::today);
        timelock.validate()?;

        if !(0.0..=1.0).contains(&plan.confidence) {
            return Err(OrchestrationError::InvalidPlan(format!(
                "planner confidence {} outside [0, 1]",
                plan.confidence
            )));
        }

        if plan.confidence < PLANNER_CONFIDENCE_WARNING {
            warn!(
                confidence = plan.confidence,
                intent = %plan.intent,
                "Low planner confidence"
            );
        }

        let domain = plan.domain.unwrap_or(if plan.intent.is_financial() {
            DomainType::Financial
        } else {
            DomainType::NonFinancial
        });

        let context = ExecutionContext {
            query: plan.query.trim().to_string(),
            intent: plan.intent,
            entities: plan.entities.clone(),
            timelock,
            domain,
            planner_confidence: plan.confidence,
            required_metrics: plan.required_metrics.clone(),
            historical: self.heuristics.is_historical(&plan.query),
            region_hint: self.heuristics.region_hint(&plan.query),
        };

        debug!(
            intent = %context.intent,
            entities = context.entities.len(),
            domain = ?context.domain,
            historical = context.historical,
            "Execution context built"
        );

        Ok(context)
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new(Arc::new(NoHeuristics))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_default_timelock_is_today() {
        let builder = ContextBuilder::default();
        let ctx = builder
            .build(&QueryPlan::new(Intent::MarketPrices, "AAPL price"))
            .unwrap();

        assert_eq!(ctx.timelock().as_of_date, ctx.timelock().max_allowed_date);
        assert_eq!(ctx.domain(), DomainType::Financial);
    }

    #[test]
    fn test_inverted_timelock_fails() {
        let mut plan = QueryPlan::new(Intent::MacroData, "US inflation");
        plan.timelock = Some(Timelock {
            as_of_date: date("2024-01-10"),
            max_allowed_date: date("2024-01-01"),
        });

        let err = ContextBuilder::default().build(&plan).unwrap_err();
        assert!(matches!(err, OrchestrationError::TimelockViolation(_)));
    }

    #[test]
    fn test_confidence_out_of_range_is_invalid() {
        let mut plan = QueryPlan::new(Intent::NewsAnalysis, "latest news");
        plan.confidence = 1.4;

        let err = ContextBuilder::default().build(&plan).unwrap_err();
        assert!(matches!(err, OrchestrationError::InvalidPlan(_)));
    }

    #[test]
    fn test_domain_derivation_and_override() {
        let builder = ContextBuilder::default();
        let ctx = builder
            .build(&QueryPlan::new(Intent::NonFinancial, "best pizza in town"))
            .unwrap();
        assert_eq!(ctx.domain(), DomainType::NonFinancial);

        let mut plan = QueryPlan::new(Intent::Mixed, "oil and football");
        plan.domain = Some(DomainType::Mixed);
        assert_eq!(builder.build(&plan).unwrap().domain(), DomainType::Mixed);
    }

    #[test]
    fn test_keyword_heuristics() {
        let h = KeywordHeuristics;
        assert!(h.is_historical("inflation during 2008 crisis"));
        assert!(h.is_historical("compare rates over time"));
        assert!(!h.is_historical("current repo rate"));
        assert_eq!(h.region_hint("What did the Fed do?"), Some("US".to_string()));
        assert_eq!(h.region_hint("RBI policy rate"), Some("IN".to_string()));
        assert_eq!(h.region_hint("gold price"), None);
    }

    #[test]
    fn test_region_markers_match_whole_words() {
        let h = KeywordHeuristics;
        assert_eq!(h.region_hint("India GDP status"), Some("IN".to_string()));
        assert_eq!(h.region_hint("focus on inflation"), None);
        assert_eq!(h.region_hint("fedex quarterly results"), None);
        assert_eq!(h.region_hint("U.S. treasury yields"), Some("US".to_string()));
        assert_eq!(h.region_hint("Federal Reserve minutes"), Some("US".to_string()));
    }

    #[test]
    fn test_signals_carry_heuristic_verdicts() {
        let builder = ContextBuilder::new(Arc::new(KeywordHeuristics));
        let ctx = builder
            .build(&QueryPlan::new(Intent::MacroData, "US inflation in 2022"))
            .unwrap();

        let signals = ctx.signals();
        assert!(signals.historical);
        assert_eq!(signals.region_hint.as_deref(), Some("US"));
    }
}
