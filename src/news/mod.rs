//! Second-stage news analysis
//!
//! Runs after the news worker succeeds. Checks domain purity, quarantines
//! forward-looking, unverifiable or contaminated articles, and synthesises a
//! summary from the clean ones. Analysis is synchronous and CPU-bound; the
//! execution coordinator runs it on a blocking thread.

use crate::context::ExecutionContext;
use crate::models::{DomainPurity, DomainType, GovernanceMetadata, QuarantineStatus, WorkerKind};
use crate::text;
use crate::workers::{
    Article, ArticleAssessment, NewsAnalysisOutput, NewsAnalysisPayload, NewsPayload, Synthesis,
    WorkerError, WorkerErrorStatus,
};
use chrono::Utc;
use reqwest::Url;
use tracing::{debug, info};

/// Analyzer contract. Blocking governance failures are returned as errors.
pub trait NewsAnalyzer: Send + Sync {
    fn analyze(
        &self,
        news: &NewsPayload,
        context: &ExecutionContext,
    ) -> Result<NewsAnalysisOutput, WorkerError>;
}

const FORWARD_LOOKING_KEYWORDS: &[&str] = &[
    "will", "expect", "forecast", "guidance", "outlook", "target", "estimate",
    "projected", "anticipated", "predicts", "sees", "expects to", "plans to",
    "aims to", "intends to", "next quarter", "next year", "going forward",
    "in the future",
];

/// Hedged analytical phrasing; raises the forward-looking bar
const FORWARD_LOOKING_EXCLUSIONS: &[&str] = &[
    "likely impact", "could affect", "may result", "might lead to",
    "potential impact", "possible effects", "risk of",
];

const FINANCIAL_KEYWORDS: &[&str] = &[
    "stock", "share", "market", "revenue", "profit", "earnings", "valuation",
    "pe ratio", "roe", "roce", "dividend", "ebitda", "eps", "margin", "debt",
    "equity", "assets", "liabilities", "cash flow", "trading", "price", "volume",
    "index", "commodity", "renewable", "solar", "wind", "capacity", "power",
    "energy", "electricity", "generation", "gw", "mw", "renewables",
    "clean energy", "green energy", "solar power", "wind power",
    "capacity addition", "power plant", "grid",
];

const FORWARD_LOOKING_THRESHOLD: usize = 3;
const FORWARD_LOOKING_THRESHOLD_HEDGED: usize = 5;
const MIN_FINANCIAL_KEYWORDS: usize = 2;
const MIN_FINANCIAL_RATIO: f64 = 0.5;
const MIN_CONTENT_CHARS: usize = 50;
const QUARANTINE_RATIO: f64 = 0.5;

const ALL_QUARANTINED_SUMMARY: &str =
    "All articles contain forward-looking content and have been quarantined";

fn article_words(article: &Article) -> Vec<String> {
    text::words(&format!("{} {}", article.title, article.content))
}

/// Deterministic keyword-driven analyzer
#[derive(Debug, Default, Clone)]
pub struct RuleBasedNewsAnalyzer;

impl RuleBasedNewsAnalyzer {
    pub fn new() -> Self {
        Self
    }

    fn check_domain_purity(
        &self,
        articles: &[Article],
        context: &ExecutionContext,
    ) -> Result<DomainPurity, WorkerError> {
        if context.domain() != DomainType::Financial {
            return Ok(DomainPurity::Skipped);
        }
        if context.is_historical() {
            debug!("Relaxed domain purity for historical query");
            return Ok(DomainPurity::Skipped);
        }

        let financial = articles
            .iter()
            .filter(|a| text::count_mentions(&article_words(a), FINANCIAL_KEYWORDS) >= MIN_FINANCIAL_KEYWORDS)
            .count();

        if (financial as f64) < articles.len() as f64 * MIN_FINANCIAL_RATIO {
            return Err(WorkerError::new(
                WorkerKind::NewsAnalysis,
                WorkerErrorStatus::DomainContamination,
                format!("Only {}/{} articles are financial", financial, articles.len()),
            )
            .with_metadata("expected_domain", "FINANCIAL")
            .with_metadata("actual_domain", "MIXED/NON_FINANCIAL"));
        }

        Ok(DomainPurity::Passed)
    }

    fn assess(&self, article: &Article) -> ArticleAssessment {
        let words = article_words(article);
        let financial_keywords = text::count_mentions(&words, FINANCIAL_KEYWORDS);
        let forward_looking_signals = text::count_mentions(&words, FORWARD_LOOKING_KEYWORDS);

        let (quarantine_status, note) = if article.content.trim().chars().count() < MIN_CONTENT_CHARS {
            (QuarantineStatus::Contaminated, Some("content too short to verify".to_string()))
        } else if !is_valid_url(&article.url) {
            (QuarantineStatus::Unverifiable, Some(format!("invalid source url '{}'", article.url)))
        } else {
            let threshold = if text::count_mentions(&words, FORWARD_LOOKING_EXCLUSIONS) > 0 {
                FORWARD_LOOKING_THRESHOLD_HEDGED
            } else {
                FORWARD_LOOKING_THRESHOLD
            };
            if forward_looking_signals >= threshold {
                (
                    QuarantineStatus::ForwardLooking,
                    Some(format!("{} forward-looking signals", forward_looking_signals)),
                )
            } else {
                (QuarantineStatus::Clean, None)
            }
        };

        ArticleAssessment {
            title: article.title.clone(),
            url: article.url.clone(),
            source: article.source.clone(),
            quarantine_status,
            financial_keywords,
            forward_looking_signals,
            note,
        }
    }

    fn synthesize(&self, assessments: &[ArticleAssessment]) -> Synthesis {
        let clean: Vec<&ArticleAssessment> = assessments
            .iter()
            .filter(|a| a.quarantine_status == QuarantineStatus::Clean)
            .collect();

        if clean.is_empty() {
            return Synthesis {
                summary: ALL_QUARANTINED_SUMMARY.to_string(),
                sources: vec![],
                clean_articles: 0,
            };
        }

        let mut sources: Vec<String> = clean.iter().map(|a| a.source.clone()).collect();
        sources.sort();
        sources.dedup();

        let headlines: Vec<&str> = clean.iter().map(|a| a.title.as_str()).collect();
        Synthesis {
            summary: format!(
                "{} factual article(s) from {}: {}",
                clean.len(),
                sources.join(", "),
                headlines.join("; ")
            ),
            sources,
            clean_articles: clean.len(),
        }
    }
}

impl NewsAnalyzer for RuleBasedNewsAnalyzer {
    fn analyze(
        &self,
        news: &NewsPayload,
        context: &ExecutionContext,
    ) -> Result<NewsAnalysisOutput, WorkerError> {
        let articles = &news.articles;

        if articles.is_empty() {
            return Ok(NewsAnalysisOutput {
                status: "no_content".to_string(),
                analysis: NewsAnalysisPayload::default(),
                governance: GovernanceMetadata::default(),
            });
        }

        let max_allowed = context.timelock().max_allowed_date;
        if let Some(late) = articles
            .iter()
            .find(|a| a.published_date().is_some_and(|d| d > max_allowed))
        {
            return Err(WorkerError::new(
                WorkerKind::NewsAnalysis,
                WorkerErrorStatus::TimelockViolation,
                format!("Article '{}' is dated after {}", late.title, max_allowed),
            ));
        }

        let domain_purity = self.check_domain_purity(articles, context)?;

        let assessments: Vec<ArticleAssessment> = articles.iter().map(|a| self.assess(a)).collect();
        let quarantined = assessments
            .iter()
            .filter(|a| a.quarantine_status != QuarantineStatus::Clean)
            .count();

        let quarantine_status =
            if quarantined as f64 / assessments.len() as f64 >= QUARANTINE_RATIO {
                QuarantineStatus::ForwardLooking
            } else {
                QuarantineStatus::Clean
            };

        let synthesis = self.synthesize(&assessments);

        info!(
            articles = articles.len(),
            quarantined,
            quarantine_status = ?quarantine_status,
            domain_purity = ?domain_purity,
            "News analysis completed"
        );

        Ok(NewsAnalysisOutput {
            status: "success".to_string(),
            governance: GovernanceMetadata {
                timelock_validated: true,
                domain_purity,
                completeness_score: assessments.len() as f64 / articles.len() as f64,
                quarantine_status,
                validated_at: Utc::now(),
            },
            analysis: NewsAnalysisPayload {
                individual_articles: assessments,
                synthesis: Some(synthesis),
            },
        })
    }
}

fn is_valid_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    match parsed.host_str() {
        Some(host) => host == "localhost" || host.contains('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextBuilder, KeywordHeuristics};
    use crate::models::{Intent, QueryPlan};
    use std::sync::Arc;

    const FINANCIAL_BODY: &str =
        "Shares of the company rose after quarterly earnings beat estimates; revenue and profit margin improved on strong trading volume.";

    fn article(title: &str, source: &str, content: &str) -> Article {
        Article {
            title: title.to_string(),
            url: format!("https://{}.com/story", source.to_lowercase()),
            source: source.to_string(),
            published: Some("2024-01-05".to_string()),
            content: content.to_string(),
            word_count: content.split_whitespace().count(),
        }
    }

    fn context(intent: Intent, query: &str) -> ExecutionContext {
        ContextBuilder::new(Arc::new(KeywordHeuristics))
            .build(&QueryPlan::new(intent, query))
            .unwrap()
    }

    #[test]
    fn test_empty_news_is_no_content() {
        let output = RuleBasedNewsAnalyzer
            .analyze(&NewsPayload::default(), &context(Intent::NewsAnalysis, "market news"))
            .unwrap();
        assert_eq!(output.status, "no_content");
        assert!(output.analysis.synthesis.is_none());
    }

    #[test]
    fn test_clean_financial_articles() {
        let news = NewsPayload {
            articles: vec![
                article("Earnings beat", "Reuters", FINANCIAL_BODY),
                article("Stock rallies", "Bloomberg", FINANCIAL_BODY),
            ],
        };
        let output = RuleBasedNewsAnalyzer
            .analyze(&news, &context(Intent::NewsAnalysis, "latest market news"))
            .unwrap();

        assert_eq!(output.governance.quarantine_status, QuarantineStatus::Clean);
        assert_eq!(output.governance.domain_purity, DomainPurity::Passed);
        assert_eq!(output.governance.completeness_score, 1.0);
        let synthesis = output.analysis.synthesis.unwrap();
        assert_eq!(synthesis.clean_articles, 2);
        assert_eq!(synthesis.sources, vec!["Bloomberg", "Reuters"]);
    }

    #[test]
    fn test_forward_looking_quarantine() {
        let speculative = "The company will raise guidance; analysts expect a higher target and forecast stronger share price growth next year.";
        let news = NewsPayload {
            articles: vec![
                article("Outlook raised", "Reuters", speculative),
                article("Guidance up", "Bloomberg", speculative),
                article("Earnings beat", "Mint", FINANCIAL_BODY),
            ],
        };
        let output = RuleBasedNewsAnalyzer
            .analyze(&news, &context(Intent::NewsAnalysis, "latest market news"))
            .unwrap();

        assert_eq!(output.governance.quarantine_status, QuarantineStatus::ForwardLooking);
        let synthesis = output.analysis.synthesis.unwrap();
        assert_eq!(synthesis.clean_articles, 1);
    }

    #[test]
    fn test_keywords_inside_longer_words_are_not_signals() {
        let body = "Goodwill impairment lowered profit at the unit the CFO oversees; the board is unwilling to revise revenue estimates, and the stock price fell.";
        let news = NewsPayload {
            articles: vec![article("Goodwill charge", "Reuters", body)],
        };
        let output = RuleBasedNewsAnalyzer
            .analyze(&news, &context(Intent::NewsAnalysis, "latest market news"))
            .unwrap();

        let assessment = &output.analysis.individual_articles[0];
        assert_eq!(assessment.forward_looking_signals, 1);
        assert_eq!(assessment.quarantine_status, QuarantineStatus::Clean);
        assert!(assessment.financial_keywords >= 4);
    }

    #[test]
    fn test_all_quarantined_summary() {
        let mut bad_url = article("Stock news", "Reuters", FINANCIAL_BODY);
        bad_url.url = "not a url".to_string();
        let short = article("Share price", "Mint", "stock price up");

        let output = RuleBasedNewsAnalyzer
            .analyze(
                &NewsPayload { articles: vec![bad_url, short] },
                &context(Intent::NewsAnalysis, "latest market news"),
            )
            .unwrap();

        let statuses: Vec<_> = output
            .analysis
            .individual_articles
            .iter()
            .map(|a| a.quarantine_status)
            .collect();
        assert_eq!(statuses, vec![QuarantineStatus::Unverifiable, QuarantineStatus::Contaminated]);
        assert_eq!(output.analysis.synthesis.unwrap().summary, ALL_QUARANTINED_SUMMARY);
    }

    #[test]
    fn test_domain_contamination_is_blocking() {
        let sports = "The striker scored twice as the home side won the derby in front of a sellout crowd last night.";
        let news = NewsPayload {
            articles: vec![
                article("Derby win", "ESPN", sports),
                article("Cup final", "BBC", sports),
            ],
        };
        let err = RuleBasedNewsAnalyzer
            .analyze(&news, &context(Intent::NewsAnalysis, "latest market news"))
            .unwrap_err();

        assert_eq!(err.status, WorkerErrorStatus::DomainContamination);
        assert!(err.is_blocking());

        // Historical queries relax the purity check
        let output = RuleBasedNewsAnalyzer
            .analyze(&news, &context(Intent::NewsAnalysis, "market news during the 2008 crisis"))
            .unwrap();
        assert_eq!(output.governance.domain_purity, DomainPurity::Skipped);
    }

    #[test]
    fn test_article_after_timelock_is_violation() {
        let mut late = article("Earnings beat", "Reuters", FINANCIAL_BODY);
        late.published = Some("2999-01-01".to_string());

        let err = RuleBasedNewsAnalyzer
            .analyze(
                &NewsPayload { articles: vec![late] },
                &context(Intent::NewsAnalysis, "latest market news"),
            )
            .unwrap_err();
        assert_eq!(err.status, WorkerErrorStatus::TimelockViolation);
    }

    #[test]
    fn test_url_validation() {
        assert!(is_valid_url("https://www.reuters.com/markets"));
        assert!(is_valid_url("http://localhost:8000/a"));
        assert!(!is_valid_url("ftp://files.example.com"));
        assert!(!is_valid_url("https://intranet/page"));
        assert!(!is_valid_url(""));
    }
}
