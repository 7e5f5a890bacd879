//! Static decision tables
//!
//! Which workers run for an intent, which of them are critical, and the
//! thresholds that drive escalation. `Policy::default()` carries the
//! production values; tests and embedders may override any table.

use crate::models::{Intent, WorkerKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Critical worker selection for one intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriticalWorkers {
    Fixed(Vec<WorkerKind>),
    /// Every worker present in the result map is critical
    AllPresent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub intent_workers: HashMap<Intent, Vec<WorkerKind>>,
    pub critical_workers: HashMap<Intent, CriticalWorkers>,
    pub intent_thresholds: HashMap<Intent, f64>,
    /// Per-worker quality bar, used to explain why a fallback fired
    pub worker_thresholds: HashMap<WorkerKind, f64>,

    pub critical_failure_below: f64,
    pub critical_success_at: f64,
    pub penalty_per_critical_failure: f64,
    pub aggregate_floor: f64,
    /// NEWS_ANALYSIS sub-score below this escalates NEWS_ANALYSIS queries
    pub news_analysis_override: f64,
    /// Weight of MACRO in the MACRO_DATA blend; NEWS gets the rest
    pub macro_weight: f64,
    /// Half-width of the ACCEPTABLE/LOW assessment bands
    pub assessment_band: f64,
}

impl Default for Policy {
    fn default() -> Self {
        use WorkerKind::*;

        let intent_workers = HashMap::from([
            (Intent::MacroData, vec![Macro, News]),
            (Intent::CompanyFundamentals, vec![]),
            (Intent::MarketPrices, vec![Prices, News]),
            (Intent::NewsAnalysis, vec![News]),
            (
                Intent::Mixed,
                vec![Macro, Prices, FundamentalsIn, FundamentalsUs, News],
            ),
            (Intent::NonFinancial, vec![News]),
        ]);

        let critical_workers = HashMap::from([
            (Intent::MacroData, CriticalWorkers::Fixed(vec![Macro])),
            (
                Intent::CompanyFundamentals,
                CriticalWorkers::Fixed(vec![FundamentalsIn, FundamentalsUs]),
            ),
            (Intent::MarketPrices, CriticalWorkers::Fixed(vec![Prices])),
            (
                Intent::NewsAnalysis,
                CriticalWorkers::Fixed(vec![News, NewsAnalysis]),
            ),
            (Intent::Mixed, CriticalWorkers::AllPresent),
            (Intent::NonFinancial, CriticalWorkers::Fixed(vec![])),
        ]);

        let intent_thresholds = HashMap::from([
            (Intent::MacroData, 0.80),
            (Intent::CompanyFundamentals, 0.10),
            (Intent::MarketPrices, 0.60),
            (Intent::NewsAnalysis, 0.50),
            (Intent::Mixed, 0.55),
            (Intent::NonFinancial, 0.30),
        ]);

        let worker_thresholds = HashMap::from([
            (Prices, 0.6),
            (FundamentalsIn, 0.5),
            (FundamentalsUs, 0.5),
            (Macro, 0.7),
            (News, 0.5),
            (NewsAnalysis, 0.6),
        ]);

        Self {
            intent_workers,
            critical_workers,
            intent_thresholds,
            worker_thresholds,
            critical_failure_below: 0.3,
            critical_success_at: 0.5,
            penalty_per_critical_failure: 0.2,
            aggregate_floor: 0.2,
            news_analysis_override: 0.6,
            macro_weight: 0.7,
            assessment_band: 0.15,
        }
    }
}

impl Policy {
    /// Workers to launch for an intent, in table order
    pub fn workers_for(&self, intent: Intent) -> &[WorkerKind] {
        self.intent_workers
            .get(&intent)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Resolve the critical set against the keys actually present
    pub fn critical_workers<I>(&self, intent: Intent, present: I) -> Vec<WorkerKind>
    where
        I: IntoIterator<Item = WorkerKind>,
    {
        match self.critical_workers.get(&intent) {
            Some(CriticalWorkers::Fixed(kinds)) => kinds.clone(),
            Some(CriticalWorkers::AllPresent) => present.into_iter().collect(),
            None => vec![],
        }
    }

    /// Escalation threshold; unknown intents never pass
    pub fn intent_threshold(&self, intent: Intent) -> f64 {
        self.intent_thresholds.get(&intent).copied().unwrap_or(1.0)
    }

    pub fn worker_threshold(&self, worker: WorkerKind) -> Option<f64> {
        self.worker_thresholds.get(&worker).copied()
    }
}
