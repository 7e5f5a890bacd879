//! Typed worker payloads
//!
//! Each worker's data is validated into one of these shapes at the worker
//! boundary; nothing downstream inspects raw JSON.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{GovernanceMetadata, QuarantineStatus};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum WorkerPayload {
    Macro(MacroPayload),
    Prices(PricesPayload),
    Fundamentals(FundamentalsPayload),
    News(NewsPayload),
    NewsAnalysis(NewsAnalysisPayload),
    Empty,
}

// ===== Macro =====

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MacroPayload {
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default, rename = "macro_facts")]
    pub indicators: BTreeMap<String, MacroIndicator>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MacroIndicator {
    pub status: String,
    #[serde(default)]
    pub latest_value: Option<f64>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl MacroIndicator {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

impl MacroPayload {
    pub fn successful_indicators(&self) -> usize {
        self.indicators.values().filter(|i| i.is_success()).count()
    }
}

// ===== Prices =====

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct PricesPayload {
    pub quotes: BTreeMap<String, Quote>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Quote {
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub change: Option<f64>,
    #[serde(default)]
    pub change_pct: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Quote {
    pub fn complete(price: f64, change: f64, change_pct: f64) -> Self {
        Self {
            current_price: Some(price),
            change: Some(change),
            change_pct: Some(change_pct),
            error: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.current_price.is_some() && self.change.is_some() && self.change_pct.is_some()
    }
}

// ===== Fundamentals =====

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(transparent)]
pub struct FundamentalsPayload {
    pub companies: BTreeMap<String, CompanyMetrics>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CompanyMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub metrics: BTreeMap<String, Value>,
}

impl CompanyMetrics {
    /// A metric counts only when present and non-null
    pub fn has(&self, metric: &str) -> bool {
        self.metrics.get(metric).is_some_and(|v| !v.is_null())
    }
}

// ===== News =====

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NewsPayload {
    #[serde(default)]
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Article {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub source: String,
    /// ISO date (or datetime) string as reported by the source
    #[serde(default)]
    pub published: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub word_count: usize,
}

impl Article {
    /// Leading `YYYY-MM-DD` of the published timestamp
    pub fn published_date(&self) -> Option<NaiveDate> {
        let head = self.published.as_deref()?.get(..10)?;
        NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
    }
}

impl NewsPayload {
    pub fn distinct_sources(&self) -> usize {
        self.articles
            .iter()
            .map(|a| a.source.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn average_word_count(&self) -> f64 {
        if self.articles.is_empty() {
            return 0.0;
        }
        let total: usize = self.articles.iter().map(|a| a.word_count).sum();
        total as f64 / self.articles.len() as f64
    }
}

// ===== News analysis =====

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct NewsAnalysisPayload {
    pub individual_articles: Vec<ArticleAssessment>,
    pub synthesis: Option<Synthesis>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArticleAssessment {
    pub title: String,
    pub url: String,
    pub source: String,
    pub quarantine_status: QuarantineStatus,
    pub financial_keywords: usize,
    pub forward_looking_signals: usize,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Synthesis {
    pub summary: String,
    pub sources: Vec<String>,
    pub clean_articles: usize,
}

/// Output of a [`NewsAnalyzer`](crate::news::NewsAnalyzer) run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewsAnalysisOutput {
    /// `success` or a degraded status such as `no_content`
    pub status: String,
    pub analysis: NewsAnalysisPayload,
    pub governance: GovernanceMetadata,
}
