use analysis_core::{FundamentalMetrics, PricePoint, SentimentItem};
use chrono::{DateTime, Utc};
use fundamental_analysis::{FinancialStatement, FundamentalAnalysisEngine};
use sentiment_analysis::Lexicon;
use serde::Deserialize;

/// A raw headline to be scored with the word-list lexicon
#[derive(Debug, Clone, Deserialize)]
pub struct Headline {
    #[serde(default = "default_source")]
    pub source: String,
    pub timestamp: DateTime<Utc>,
    pub text: String,
}

fn default_source() -> String {
    "news".to_string()
}

/// One evaluation request as read from JSON.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationRequest {
    pub asset_id: String,
    /// Defaults to the time the request is processed
    #[serde(default)]
    pub as_of: Option<DateTime<Utc>>,
    pub price_history: Vec<PricePoint>,
    #[serde(default)]
    pub fundamentals: Option<FundamentalMetrics>,
    /// Raw statement figures, used when `fundamentals` is absent
    #[serde(default)]
    pub statement: Option<FinancialStatement>,
    #[serde(default)]
    pub sentiment: Vec<SentimentItem>,
    #[serde(default)]
    pub headlines: Vec<Headline>,
}

impl EvaluationRequest {
    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of.unwrap_or_else(Utc::now)
    }

    pub fn fundamental_metrics(&self, engine: &FundamentalAnalysisEngine) -> FundamentalMetrics {
        match (&self.fundamentals, &self.statement) {
            (Some(metrics), _) => metrics.clone(),
            (None, Some(statement)) => engine.derive_metrics(&self.asset_id, "latest", statement),
            (None, None) => FundamentalMetrics::new(&self.asset_id, "latest"),
        }
    }

    /// Explicit sentiment items followed by scored headlines.
    pub fn sentiment_items(&self, lexicon: &Lexicon) -> Vec<SentimentItem> {
        let mut items = self.sentiment.clone();
        items.extend(
            self.headlines
                .iter()
                .map(|h| lexicon.headline_item(&h.source, h.timestamp, &h.text)),
        );
        items
    }
}
