use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, Component};

/// OHLCV price point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Check that a price history is strictly time-ascending, has finite prices,
/// and contains nothing recorded after `as_of`.
pub fn validate_price_history(
    component: Component,
    prices: &[PricePoint],
    as_of: DateTime<Utc>,
) -> Result<(), AnalysisError> {
    for (i, p) in prices.iter().enumerate() {
        let finite = [p.open, p.high, p.low, p.close, p.volume].iter().all(|v| v.is_finite());
        if !finite {
            return Err(AnalysisError::InvalidData {
                component,
                subject: format!("price_history[{}]", i),
                reason: "non-finite price or volume".to_string(),
            });
        }
        if p.timestamp > as_of {
            return Err(AnalysisError::InvalidData {
                component,
                subject: format!("price_history[{}]", i),
                reason: format!("timestamp {} is after as-of {}", p.timestamp, as_of),
            });
        }
        if i > 0 && p.timestamp <= prices[i - 1].timestamp {
            return Err(AnalysisError::InvalidData {
                component,
                subject: format!("price_history[{}]", i),
                reason: "timestamps must be strictly ascending".to_string(),
            });
        }
    }
    Ok(())
}

/// Discrete signal category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStrength {
    StrongSell,
    Sell,
    Hold,
    Buy,
    StrongBuy,
}

impl SignalStrength {
    pub const ALL: [SignalStrength; 5] = [
        SignalStrength::StrongSell,
        SignalStrength::Sell,
        SignalStrength::Hold,
        SignalStrength::Buy,
        SignalStrength::StrongBuy,
    ];

    /// Ordinal from -2 (strong sell) to +2 (strong buy)
    pub fn rank(&self) -> i32 {
        match self {
            SignalStrength::StrongSell => -2,
            SignalStrength::Sell => -1,
            SignalStrength::Hold => 0,
            SignalStrength::Buy => 1,
            SignalStrength::StrongBuy => 2,
        }
    }

    pub fn is_bearish(&self) -> bool {
        self.rank() < 0
    }

    /// Human-readable label for the signal
    pub fn to_label(&self) -> &'static str {
        match self {
            SignalStrength::StrongBuy => "Strong Buy",
            SignalStrength::Buy => "Buy",
            SignalStrength::Hold => "Hold",
            SignalStrength::Sell => "Sell",
            SignalStrength::StrongSell => "Strong Sell",
        }
    }
}

/// A pillar's normalized output: score in [-1, 1], confidence in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PillarScore {
    pub score: f64,
    pub confidence: f64,
}

impl PillarScore {
    pub fn new(score: f64, confidence: f64) -> Self {
        Self { score, confidence }
    }

    /// A pillar that contributed nothing (excluded or failed).
    pub fn excluded() -> Self {
        Self { score: 0.0, confidence: 0.0 }
    }
}

/// One computed indicator inside a technical snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorReading {
    pub value: f64,
    /// Normalized contribution in [-1, 1]
    pub contribution: f64,
    pub nominal_weight: f64,
    /// Weight after redistribution of excluded indicators
    pub effective_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExcludedIndicator {
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalSnapshot {
    pub asset_id: String,
    pub as_of: DateTime<Utc>,
    pub indicators: BTreeMap<String, IndicatorReading>,
    pub excluded: Vec<ExcludedIndicator>,
    pub score: f64,
    pub confidence: f64,
}

/// Raw fundamental metrics; `None` marks an unavailable metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FundamentalMetrics {
    pub asset_id: String,
    pub period: String,
    #[serde(default)]
    pub values: BTreeMap<String, Option<f64>>,
}

impl FundamentalMetrics {
    pub fn new(asset_id: impl Into<String>, period: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            period: period.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, metric: &str, value: Option<f64>) -> Self {
        self.values.insert(metric.to_string(), value);
        self
    }

    pub fn get(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).copied().flatten()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalScore {
    pub asset_id: String,
    pub period: String,
    pub score: f64,
    pub confidence: f64,
    /// Normalized per-metric values in [-1, 1]
    pub contributions: BTreeMap<String, f64>,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentItem {
    pub source: String,
    pub timestamp: DateTime<Utc>,
    /// Raw polarity in [-1, 1]
    pub polarity: f64,
    /// Relevance in [0, 1]
    pub relevance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub score: f64,
    pub confidence: f64,
    pub item_count: usize,
    pub total_weight: f64,
    pub half_life_hours: f64,
}

impl SentimentScore {
    pub fn neutral(half_life_hours: f64) -> Self {
        Self {
            score: 0.0,
            confidence: 0.0,
            item_count: 0,
            total_weight: 0.0,
            half_life_hours,
        }
    }
}

/// Per-pillar weights (nominal or effective)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PillarWeights {
    pub technical: f64,
    pub fundamental: f64,
    pub sentiment: f64,
}

impl PillarWeights {
    pub fn total(&self) -> f64 {
        self.technical + self.fundamental + self.sentiment
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    pub asset_id: String,
    pub as_of: DateTime<Utc>,
    pub technical: PillarScore,
    pub fundamental: PillarScore,
    pub sentiment: PillarScore,
    /// Renormalized weights; always sum to 1
    pub effective_weights: PillarWeights,
    pub score: f64,
    pub signal: SignalStrength,
    pub recommendation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn from_signal(signal: SignalStrength) -> Self {
        if signal.is_bearish() {
            Direction::Short
        } else {
            Direction::Long
        }
    }

    /// +1 for long, -1 for short
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub warning: f64,
    /// Equal to the stop-loss price
    pub critical: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    None,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskDecision {
    pub composite: CompositeScore,
    pub volatility: f64,
    pub entry_price: f64,
    pub account_equity: f64,
    pub max_risk_per_trade: f64,
    pub direction: Direction,
    pub conviction: f64,
    /// Units, never negative
    pub position_size: f64,
    pub position_value: f64,
    pub risk_budget: f64,
    pub loss_at_stop: f64,
    pub stop_distance: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub alerts: AlertThresholds,
    pub capped_by_exposure: bool,
    /// The long stop would have fallen at or below zero and was clamped to zero
    #[serde(default)]
    pub stop_floored: bool,
}

/// Every stage's output for one evaluation, for narrative consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedAnalysis {
    pub asset_id: String,
    pub as_of: DateTime<Utc>,
    pub technical: Option<TechnicalSnapshot>,
    pub fundamental: Option<FundamentalScore>,
    pub sentiment: Option<SentimentScore>,
    /// Pillars dropped because of recoverable data problems, with the reason
    pub excluded_pillars: Vec<(Component, String)>,
    pub decision: RiskDecision,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn point(ts: DateTime<Utc>, close: f64) -> PricePoint {
        PricePoint {
            timestamp: ts,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_signal_ordering_matches_rank() {
        for pair in SignalStrength::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].rank() < pair[1].rank());
        }
    }

    #[test]
    fn test_direction_from_signal() {
        assert_eq!(Direction::from_signal(SignalStrength::StrongBuy), Direction::Long);
        assert_eq!(Direction::from_signal(SignalStrength::Hold), Direction::Long);
        assert_eq!(Direction::from_signal(SignalStrength::Sell), Direction::Short);
    }

    #[test]
    fn test_price_history_rejects_duplicates() {
        let now = Utc::now();
        let prices = vec![point(now - Duration::days(1), 10.0), point(now - Duration::days(1), 11.0)];
        let err = validate_price_history(Component::Technical, &prices, now).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidData { ref subject, .. } if subject == "price_history[1]"));
    }

    #[test]
    fn test_price_history_rejects_lookahead() {
        let now = Utc::now();
        let prices = vec![point(now - Duration::days(1), 10.0), point(now + Duration::days(1), 11.0)];
        assert!(validate_price_history(Component::Technical, &prices, now).is_err());
    }

    #[test]
    fn test_price_history_tolerates_gaps() {
        let now = Utc::now();
        let prices = vec![point(now - Duration::days(10), 10.0), point(now - Duration::days(1), 11.0)];
        assert!(validate_price_history(Component::Technical, &prices, now).is_ok());
    }

    #[test]
    fn test_fundamental_metrics_builder() {
        let m = FundamentalMetrics::new("AAPL", "2024Q4")
            .with("pe_ratio", Some(18.0))
            .with("peg_ratio", None);
        assert_eq!(m.get("pe_ratio"), Some(18.0));
        assert_eq!(m.get("peg_ratio"), None);
        assert_eq!(m.get("unknown"), None);
    }
}
