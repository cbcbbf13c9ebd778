use chrono::{DateTime, Utc};

use crate::{
    AnalysisError, FundamentalMetrics, FundamentalScore, PillarScore, PricePoint, SentimentItem,
    SentimentScore, TechnicalSnapshot,
};

/// Anything the composer can weigh: a score in [-1, 1] backed by a confidence in [0, 1].
pub trait PillarSignal {
    fn score(&self) -> f64;
    fn confidence(&self) -> f64;

    fn pillar_score(&self) -> PillarScore {
        PillarScore::new(self.score(), self.confidence())
    }
}

/// Trait for technical analysis engines
pub trait TechnicalAnalyzer: Send + Sync {
    fn analyze(
        &self,
        asset_id: &str,
        prices: &[PricePoint],
        as_of: DateTime<Utc>,
    ) -> Result<TechnicalSnapshot, AnalysisError>;
}

/// Trait for fundamental analysis engines
pub trait FundamentalAnalyzer: Send + Sync {
    fn analyze(&self, metrics: &FundamentalMetrics) -> FundamentalScore;
}

/// Trait for sentiment analysis engines
pub trait SentimentAnalyzer: Send + Sync {
    fn analyze(&self, items: &[SentimentItem], as_of: DateTime<Utc>) -> Result<SentimentScore, AnalysisError>;
}

impl PillarSignal for PillarScore {
    fn score(&self) -> f64 {
        self.score
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }
}

impl PillarSignal for TechnicalSnapshot {
    fn score(&self) -> f64 {
        self.score
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }
}

impl PillarSignal for FundamentalScore {
    fn score(&self) -> f64 {
        self.score
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }
}

impl PillarSignal for SentimentScore {
    fn score(&self) -> f64 {
        self.score
    }

    fn confidence(&self) -> f64 {
        self.confidence
    }
}
