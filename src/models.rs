//! Core data models for the financial intelligence engine

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::confidence::ConfidenceBreakdown;
use crate::context::ExecutionContext;
use crate::error::OrchestrationError;
use crate::fallback::FallbackOutcome;
use crate::workers::WorkerResults;

//
// ================= Enums =================
//

/// Closed set of query intents produced by the upstream classifier
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    MacroData,
    CompanyFundamentals,
    MarketPrices,
    NewsAnalysis,
    Mixed,
    NonFinancial,
}

impl Intent {
    pub const ALL: [Intent; 6] = [
        Intent::MacroData,
        Intent::CompanyFundamentals,
        Intent::MarketPrices,
        Intent::NewsAnalysis,
        Intent::Mixed,
        Intent::NonFinancial,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::MacroData => "MACRO_DATA",
            Intent::CompanyFundamentals => "COMPANY_FUNDAMENTALS",
            Intent::MarketPrices => "MARKET_PRICES",
            Intent::NewsAnalysis => "NEWS_ANALYSIS",
            Intent::Mixed => "MIXED",
            Intent::NonFinancial => "NON_FINANCIAL",
        }
    }

    pub fn is_financial(&self) -> bool {
        !matches!(self, Intent::NonFinancial)
    }
}

impl FromStr for Intent {
    type Err = OrchestrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(['-', ' '], "_");
        Intent::ALL
            .into_iter()
            .find(|intent| intent.as_str() == normalized)
            .ok_or_else(|| OrchestrationError::InvalidPlan(format!("Unknown intent: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainType {
    Financial,
    NonFinancial,
    Mixed,
}

/// Worker identifiers, used both in the intent table and as result map keys
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerKind {
    Macro,
    Prices,
    FundamentalsIn,
    FundamentalsUs,
    News,
    /// Derived entry produced by the news analysis stage
    NewsAnalysis,
}

impl WorkerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerKind::Macro => "MACRO",
            WorkerKind::Prices => "PRICES",
            WorkerKind::FundamentalsIn => "FUNDAMENTALS_IN",
            WorkerKind::FundamentalsUs => "FUNDAMENTALS_US",
            WorkerKind::News => "NEWS",
            WorkerKind::NewsAnalysis => "NEWS_ANALYSIS",
        }
    }

    pub fn is_fundamentals(&self) -> bool {
        matches!(self, WorkerKind::FundamentalsIn | WorkerKind::FundamentalsUs)
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuarantineStatus {
    #[default]
    Clean,
    ForwardLooking,
    Unverifiable,
    Contaminated,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainPurity {
    Passed,
    Failed,
    #[default]
    NotChecked,
    Skipped,
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    #[default]
    Equity,
    Index,
    Commodity,
    Currency,
    Bond,
    Crypto,
    #[serde(other)]
    Other,
}

//
// ================= Plan =================
//

/// An entity resolved by the upstream extractor
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entity {
    pub name: String,
    pub ticker: String,
    #[serde(default)]
    pub asset_type: AssetType,
    #[serde(default)]
    pub region: Option<String>,
}

/// Temporal validity window. Data dated after `max_allowed_date` is invalid.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Timelock {
    pub as_of_date: NaiveDate,
    pub max_allowed_date: NaiveDate,
}

impl Timelock {
    pub fn new(as_of_date: NaiveDate, max_allowed_date: NaiveDate) -> crate::Result<Self> {
        let timelock = Self {
            as_of_date,
            max_allowed_date,
        };
        timelock.validate()?;
        Ok(timelock)
    }

    /// No future data: as-of and maximum are both today
    pub fn today() -> Self {
        let today = Utc::now().date_naive();
        Self {
            as_of_date: today,
            max_allowed_date: today,
        }
    }

    pub fn validate(&self) -> crate::Result<()> {
        if self.max_allowed_date < self.as_of_date {
            return Err(OrchestrationError::TimelockViolation(format!(
                "max_allowed_date {} cannot be before as_of_date {}",
                self.max_allowed_date, self.as_of_date
            )));
        }
        Ok(())
    }

    pub fn permits(&self, date: NaiveDate) -> bool {
        date <= self.max_allowed_date
    }
}

/// Validated output of the external classifier / entity extractor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryPlan {
    pub query: String,
    pub intent: Intent,
    #[serde(default)]
    pub entities: Vec<Entity>,
    #[serde(default = "default_planner_confidence")]
    pub confidence: f64,
    #[serde(default)]
    pub required_metrics: Vec<String>,
    /// Explicit domain override; derived from the intent when absent
    #[serde(default)]
    pub domain: Option<DomainType>,
    /// Caller-supplied window; defaults to today/today
    #[serde(default)]
    pub timelock: Option<Timelock>,
}

fn default_planner_confidence() -> f64 {
    0.5
}

impl QueryPlan {
    pub fn new(intent: Intent, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            intent,
            entities: vec![],
            confidence: default_planner_confidence(),
            required_metrics: vec![],
            domain: None,
            timelock: None,
        }
    }
}

//
// ================= Governance =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GovernanceMetadata {
    #[serde(default)]
    pub timelock_validated: bool,
    #[serde(default)]
    pub domain_purity: DomainPurity,
    #[serde(default)]
    pub completeness_score: f64,
    #[serde(default)]
    pub quarantine_status: QuarantineStatus,
    #[serde(default = "Utc::now")]
    pub validated_at: DateTime<Utc>,
}

impl Default for GovernanceMetadata {
    fn default() -> Self {
        Self {
            timelock_validated: false,
            domain_purity: DomainPurity::NotChecked,
            completeness_score: 0.0,
            quarantine_status: QuarantineStatus::Clean,
            validated_at: Utc::now(),
        }
    }
}

impl GovernanceMetadata {
    pub fn with_purity(domain_purity: DomainPurity) -> Self {
        Self {
            domain_purity,
            ..Self::default()
        }
    }
}

//
// ================= Final Result =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnvelopeStatus {
    Approved,
    ApprovedWithWarnings,
    Blocked,
    Error,
}

/// Terminal artifact returned to callers
#[derive(Debug, Clone, Serialize)]
pub struct ResultEnvelope {
    pub request_id: Uuid,
    pub status: EnvelopeStatus,
    pub query: String,
    pub intent: Intent,
    pub context: Option<ExecutionContext>,
    pub results: WorkerResults,
    pub workers_executed: Vec<WorkerKind>,
    pub confidence: Option<ConfidenceBreakdown>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackOutcome>,
    /// Human-readable reason whenever the status is not APPROVED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    pub warnings: Vec<String>,
    pub execution_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl ResultEnvelope {
    pub fn fallback_triggered(&self) -> bool {
        self.fallback.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_intent_wire_format() {
        let json = serde_json::to_string(&Intent::MarketPrices).unwrap();
        assert_eq!(json, "\"MARKET_PRICES\"");

        let parsed: Intent = serde_json::from_str("\"NON_FINANCIAL\"").unwrap();
        assert_eq!(parsed, Intent::NonFinancial);
        assert_eq!("macro-data".parse::<Intent>().unwrap(), Intent::MacroData);
        assert!("weather".parse::<Intent>().is_err());
    }

    #[test]
    fn test_worker_kind_keys() {
        let json = serde_json::to_string(&WorkerKind::FundamentalsUs).unwrap();
        assert_eq!(json, "\"FUNDAMENTALS_US\"");
        assert_eq!(WorkerKind::NewsAnalysis.to_string(), "NEWS_ANALYSIS");
    }

    #[test]
    fn test_timelock_rejects_inverted_window() {
        let err = Timelock::new(date("2024-01-10"), date("2024-01-01")).unwrap_err();
        assert!(err.is_blocking());
        assert_eq!(err.error_type(), "TIMELOCK_VIOLATION");

        let ok = Timelock::new(date("2024-01-01"), date("2024-01-10")).unwrap();
        assert!(ok.permits(date("2024-01-10")));
        assert!(!ok.permits(date("2024-01-11")));
    }

    #[test]
    fn test_plan_defaults() {
        let plan: QueryPlan = serde_json::from_value(serde_json::json!({
            "query": "What is the US CPI?",
            "intent": "MACRO_DATA"
        }))
        .unwrap();

        assert_eq!(plan.confidence, 0.5);
        assert!(plan.entities.is_empty());
        assert!(plan.timelock.is_none());
    }

    #[test]
    fn test_unknown_asset_type_maps_to_other() {
        let entity: Entity = serde_json::from_value(serde_json::json!({
            "name": "Gold ETF",
            "ticker": "GLD",
            "asset_type": "etf"
        }))
        .unwrap();
        assert_eq!(entity.asset_type, AssetType::Other);
    }
}
