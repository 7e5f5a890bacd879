//! Per-worker data quality scoring
//!
//! Each scorer looks at the shape of one worker's payload and returns a score
//! in [0, 1] with a human-readable reason.

use super::WorkerScore;
use crate::context::QuerySignals;
use crate::models::{QuarantineStatus, WorkerKind};
use crate::workers::{
    FundamentalsPayload, MacroPayload, NewsAnalysisPayload, NewsPayload, PricesPayload,
    WorkerOutput, WorkerPayload, WorkerResult, WorkerStatus,
};

const TIER1_METRICS: &[&str] = &["market_cap", "price", "pe_ratio"];
const TIER2_METRICS: &[&str] = &["roe", "roce", "pb_ratio", "book_value"];
const TIER3_METRICS: &[&str] = &["dividend_yield", "debt_to_equity", "revenue", "profit", "eps"];

const MIN_MACRO_INDICATORS: usize = 1;
const MIN_NEWS_ARTICLES: usize = 2;
const FUNDAMENTALS_PASS: f64 = 0.55;
const PRICES_PASS: f64 = 0.5;

fn clamp(score: f64) -> f64 {
    score.clamp(0.0, 1.0)
}

fn join_reasons(parts: Vec<String>, fallback: &str) -> String {
    if parts.is_empty() {
        fallback.to_string()
    } else {
        parts.join(" | ")
    }
}

/// Score one worker result. Errors and degraded statuses score zero.
pub fn score_result(worker: WorkerKind, result: &WorkerResult, query: &QuerySignals) -> WorkerScore {
    let output = match result {
        WorkerResult::Error(err) => {
            return WorkerScore::new(0.0, format!("Worker failed: {} ({})", err.status, err.message))
        }
        WorkerResult::Output(WorkerOutput {
            status: WorkerStatus::Degraded(status),
            ..
        }) => return WorkerScore::new(0.0, format!("Worker failed: {}", status)),
        WorkerResult::Output(output) => output,
    };

    match (worker, &output.payload) {
        (WorkerKind::Macro, WorkerPayload::Macro(payload)) => score_macro(payload, query),
        (WorkerKind::News, WorkerPayload::News(payload)) => score_news(payload),
        (kind, WorkerPayload::Fundamentals(payload)) if kind.is_fundamentals() => {
            score_fundamentals(payload)
        }
        (WorkerKind::Prices, WorkerPayload::Prices(payload)) => score_prices(payload),
        (WorkerKind::NewsAnalysis, WorkerPayload::NewsAnalysis(payload)) => {
            let quarantine = output
                .governance
                .as_ref()
                .map(|g| g.quarantine_status)
                .unwrap_or_default();
            score_news_analysis(payload, quarantine)
        }
        (kind, _) => WorkerScore::new(0.0, format!("Unexpected payload shape for {}", kind)),
    }
}

pub fn score_macro(payload: &MacroPayload, query: &QuerySignals) -> WorkerScore {
    let successful = payload.successful_indicators();
    if successful < MIN_MACRO_INDICATORS {
        return WorkerScore::new(
            0.2,
            format!(
                "Only {} indicators succeeded (need {})",
                successful, MIN_MACRO_INDICATORS
            ),
        );
    }

    let mut score = 0.7;
    let mut reasons = Vec::new();

    if !query.historical {
        if let Some(hint) = query.region_hint.as_deref() {
            let returned = payload.region.as_deref().unwrap_or("UNKNOWN");
            if !returned.eq_ignore_ascii_case(hint) {
                score -= 0.15;
                reasons.push(format!("Region hint {} but got {}", hint, returned));
            }
        }
    }

    if successful >= 2 {
        score += 0.15;
        reasons.push("Good indicator coverage".to_string());
    }

    WorkerScore::new(clamp(score), join_reasons(reasons, "Macro data acceptable"))
}

pub fn score_news(payload: &NewsPayload) -> WorkerScore {
    let count = payload.articles.len();
    if count < MIN_NEWS_ARTICLES {
        return WorkerScore::new(
            0.3,
            format!("Only {} articles (need {})", count, MIN_NEWS_ARTICLES),
        );
    }

    let mut score = 0.6;
    let mut reasons = Vec::new();

    let avg_words = payload.average_word_count();
    if avg_words < 150.0 {
        score -= 0.1;
        reasons.push(format!("Short articles: {:.0} words", avg_words));
    } else if avg_words > 400.0 {
        score += 0.15;
        reasons.push("Good article depth".to_string());
    }

    if payload.distinct_sources() >= 2 {
        score += 0.1;
        reasons.push("Good source diversity".to_string());
    }

    WorkerScore::new(clamp(score), join_reasons(reasons, "News quality acceptable"))
}

fn tier_completeness(metrics: &crate::workers::CompanyMetrics, tier: &[&str]) -> (usize, f64) {
    let available = tier.iter().filter(|m| metrics.has(m)).count();
    (available, available as f64 / tier.len() as f64)
}

pub fn score_fundamentals(payload: &FundamentalsPayload) -> WorkerScore {
    let validated = |score: f64, reason: String| {
        if score < FUNDAMENTALS_PASS {
            WorkerScore::new(score, format!("VALIDATION FAILED: {}", reason))
        } else {
            WorkerScore::new(score, reason)
        }
    };

    if payload.companies.is_empty() {
        return validated(0.0, "No fundamental data returned".to_string());
    }

    let total_possible = TIER1_METRICS.len() + TIER2_METRICS.len() + TIER3_METRICS.len();
    let mut company_scores = Vec::new();
    let mut reasons = Vec::new();

    for (company, metrics) in payload.companies.iter().filter(|(_, m)| m.error.is_none()) {
        let (t1, c1) = tier_completeness(metrics, TIER1_METRICS);
        let (t2, c2) = tier_completeness(metrics, TIER2_METRICS);
        let (t3, c3) = tier_completeness(metrics, TIER3_METRICS);

        let company_score = 0.50 * c1 + 0.35 * c2 + 0.15 * c3;
        let grade = match company_score {
            s if s >= 0.75 => "excellent",
            s if s >= 0.50 => "good",
            s if s >= 0.30 => "acceptable",
            _ => "poor",
        };
        reasons.push(format!("{}: {} ({}/{})", company, grade, t1 + t2 + t3, total_possible));
        company_scores.push(company_score);
    }

    if company_scores.is_empty() {
        return validated(0.0, "All companies returned errors".to_string());
    }

    let avg = company_scores.iter().sum::<f64>() / company_scores.len() as f64;
    let score = if avg >= 0.75 {
        0.85 + (avg - 0.75) * 0.4
    } else if avg >= 0.50 {
        0.70 + (avg - 0.50) * 0.6
    } else if avg >= 0.30 {
        0.55 + (avg - 0.30) * 0.75
    } else {
        0.30 + avg
    };

    validated(clamp(score), join_reasons(reasons, "Fundamental data quality acceptable"))
}

pub fn score_prices(payload: &PricesPayload) -> WorkerScore {
    let validated = |score: f64, reason: String| {
        if score <= PRICES_PASS {
            WorkerScore::new(score, format!("VALIDATION FAILED: {}", reason))
        } else {
            WorkerScore::new(score, reason)
        }
    };

    if payload.quotes.is_empty() {
        return validated(0.0, "No price data returned".to_string());
    }

    let mut score: f64 = 0.7;
    let mut reasons = Vec::new();

    for (symbol, quote) in payload.quotes.iter().filter(|(_, q)| q.error.is_none()) {
        if quote.is_complete() {
            score += 0.05;
        } else {
            score -= 0.1;
            reasons.push(format!("{}: incomplete", symbol));
        }
    }

    validated(clamp(score), join_reasons(reasons, "Price data good"))
}

pub fn score_news_analysis(payload: &NewsAnalysisPayload, quarantine: QuarantineStatus) -> WorkerScore {
    let has_summary = payload
        .synthesis
        .as_ref()
        .is_some_and(|s| !s.summary.trim().is_empty());

    if !has_summary {
        return WorkerScore::new(0.3, "News analysis incomplete");
    }
    if quarantine != QuarantineStatus::Clean {
        return WorkerScore::new(0.5, format!("Quarantined: {:?}", quarantine));
    }
    WorkerScore::new(0.75, "News analysis quality good")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::{Article, CompanyMetrics, MacroIndicator, Quote, Synthesis, WorkerError};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn indicator(status: &str) -> MacroIndicator {
        MacroIndicator {
            status: status.to_string(),
            latest_value: Some(1.0),
            unit: None,
            date: None,
        }
    }

    fn signals(text: &str, historical: bool, region: Option<&str>) -> QuerySignals {
        QuerySignals {
            text: text.to_string(),
            historical,
            region_hint: region.map(str::to_string),
        }
    }

    #[test]
    fn test_errors_and_degraded_score_zero() {
        let q = QuerySignals::plain("x");
        let err: WorkerResult = WorkerError::network(WorkerKind::Macro, "down").into();
        assert_eq!(score_result(WorkerKind::Macro, &err, &q).score, 0.0);
        assert_eq!(
            score_result(WorkerKind::Prices, &WorkerResult::degraded("no_symbols"), &q).score,
            0.0
        );
    }

    #[test]
    fn test_macro_region_mismatch_and_coverage() {
        let payload = MacroPayload {
            region: Some("IN".to_string()),
            indicators: BTreeMap::from([
                ("cpi".to_string(), indicator("success")),
                ("gdp".to_string(), indicator("success")),
            ]),
        };

        let current = score_macro(&payload, &signals("US cpi", false, Some("US")));
        assert!(approx(current.score, 0.7));
        assert!(current.reason.contains("Region hint US"));

        let historical = score_macro(&payload, &signals("US cpi in 2008", true, Some("US")));
        assert!(approx(historical.score, 0.85));

        let empty = score_macro(&MacroPayload::default(), &QuerySignals::plain("cpi"));
        assert!(approx(empty.score, 0.2));
    }

    #[test]
    fn test_news_scoring() {
        let article = |source: &str, words: usize| Article {
            source: source.to_string(),
            word_count: words,
            ..Default::default()
        };

        let one = NewsPayload { articles: vec![article("A", 500)] };
        assert!(approx(score_news(&one).score, 0.3));

        let deep = NewsPayload { articles: vec![article("A", 500), article("B", 600)] };
        assert!(approx(score_news(&deep).score, 0.85));

        let short = NewsPayload { articles: vec![article("A", 50), article("A", 60)] };
        assert!(approx(score_news(&short).score, 0.5));
    }

    #[test]
    fn test_fundamentals_piecewise_mapping() {
        let full: BTreeMap<String, serde_json::Value> = TIER1_METRICS
            .iter()
            .chain(TIER2_METRICS)
            .chain(TIER3_METRICS)
            .map(|m| (m.to_string(), json!(1.0)))
            .collect();
        let payload = FundamentalsPayload {
            companies: BTreeMap::from([(
                "TCS".to_string(),
                CompanyMetrics { error: None, metrics: full },
            )]),
        };
        // avg 1.0 -> 0.85 + 0.25 * 0.4
        assert!(approx(score_fundamentals(&payload).score, 0.95));

        let tier1_only: BTreeMap<String, serde_json::Value> =
            TIER1_METRICS.iter().map(|m| (m.to_string(), json!(1.0))).collect();
        let payload = FundamentalsPayload {
            companies: BTreeMap::from([(
                "INFY".to_string(),
                CompanyMetrics { error: None, metrics: tier1_only },
            )]),
        };
        // avg 0.5 -> 0.70
        assert!(approx(score_fundamentals(&payload).score, 0.70));

        let errored = FundamentalsPayload {
            companies: BTreeMap::from([(
                "XYZ".to_string(),
                CompanyMetrics { error: Some("not found".into()), metrics: BTreeMap::new() },
            )]),
        };
        let score = score_fundamentals(&errored);
        assert_eq!(score.score, 0.0);
        assert!(score.reason.starts_with("VALIDATION FAILED"));
    }

    #[test]
    fn test_prices_scoring() {
        let complete = PricesPayload {
            quotes: BTreeMap::from([("AAPL".to_string(), Quote::complete(190.0, 1.2, 0.6))]),
        };
        assert!(approx(score_prices(&complete).score, 0.75));

        let incomplete = PricesPayload {
            quotes: BTreeMap::from([
                ("A".to_string(), Quote::default()),
                ("B".to_string(), Quote::default()),
            ]),
        };
        let score = score_prices(&incomplete);
        assert!(approx(score.score, 0.5));
        assert!(score.reason.starts_with("VALIDATION FAILED"));

        assert_eq!(score_prices(&PricesPayload::default()).score, 0.0);
    }

    #[test]
    fn test_news_analysis_scoring() {
        let with_summary = NewsAnalysisPayload {
            individual_articles: vec![],
            synthesis: Some(Synthesis {
                summary: "2 factual articles".to_string(),
                sources: vec![],
                clean_articles: 2,
            }),
        };
        assert_eq!(score_news_analysis(&with_summary, QuarantineStatus::Clean).score, 0.75);
        assert_eq!(
            score_news_analysis(&with_summary, QuarantineStatus::ForwardLooking).score,
            0.5
        );
        assert_eq!(
            score_news_analysis(&NewsAnalysisPayload::default(), QuarantineStatus::Clean).score,
            0.3
        );
    }
}
