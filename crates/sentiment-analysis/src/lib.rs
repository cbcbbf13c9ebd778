use analysis_core::stats::clamp_unit;
use analysis_core::{AnalysisError, Component, SentimentAnalyzer, SentimentItem, SentimentScore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod lexicon;
pub use lexicon::{classify_event, Lexicon, NewsEventType};

/// Exponential decay multiplier for an item `age_hours` old.
///
/// Halves every `half_life_hours`; an item at age zero keeps its full weight.
pub fn decay_multiplier(age_hours: f64, half_life_hours: f64) -> f64 {
    0.5_f64.powf(age_hours.max(0.0) / half_life_hours)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    pub half_life_hours: f64,
    /// Total decayed weight at which confidence reaches 1
    pub saturation_weight: f64,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            half_life_hours: 48.0,
            saturation_weight: 3.0,
        }
    }
}

impl SentimentConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        for (name, value) in [
            ("half_life_hours", self.half_life_hours),
            ("saturation_weight", self.saturation_weight),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(AnalysisError::invalid_config(
                    Component::Sentiment,
                    name,
                    format!("must be a positive number, got {}", value),
                ));
            }
        }
        Ok(())
    }
}

pub struct SentimentAnalysisEngine {
    config: SentimentConfig,
}

impl SentimentAnalysisEngine {
    pub fn new() -> Self {
        Self {
            config: SentimentConfig::default(),
        }
    }

    pub fn with_config(config: SentimentConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SentimentConfig {
        &self.config
    }

    fn validate_item(index: usize, item: &SentimentItem, as_of: DateTime<Utc>) -> Result<(), AnalysisError> {
        if item.timestamp > as_of {
            return Err(AnalysisError::invalid_item(
                Component::Sentiment,
                index,
                "timestamp",
                format!("{} is after as-of {}", item.timestamp, as_of),
            ));
        }
        if !item.polarity.is_finite() || !(-1.0..=1.0).contains(&item.polarity) {
            return Err(AnalysisError::invalid_item(
                Component::Sentiment,
                index,
                "polarity",
                format!("must be within [-1, 1], got {}", item.polarity),
            ));
        }
        if !item.relevance.is_finite() || !(0.0..=1.0).contains(&item.relevance) {
            return Err(AnalysisError::invalid_item(
                Component::Sentiment,
                index,
                "relevance",
                format!("must be within [0, 1], got {}", item.relevance),
            ));
        }
        Ok(())
    }

    fn analyze_sync(&self, items: &[SentimentItem], as_of: DateTime<Utc>) -> Result<SentimentScore, AnalysisError> {
        let half_life = self.config.half_life_hours;
        if items.is_empty() {
            tracing::debug!("No sentiment items, neutral sentiment");
            return Ok(SentimentScore::neutral(half_life));
        }

        let mut weighted_sum = 0.0;
        let mut total_weight = 0.0;

        for (i, item) in items.iter().enumerate() {
            Self::validate_item(i, item, as_of)?;

            let age_hours = (as_of - item.timestamp).num_seconds() as f64 / 3600.0;
            let weight = item.relevance * decay_multiplier(age_hours, half_life);
            tracing::debug!(
                "sentiment item #{} from {}: polarity {:+.2}, age {:.1}h, weight {:.3}",
                i,
                item.source,
                item.polarity,
                age_hours,
                weight
            );

            weighted_sum += weight * item.polarity;
            total_weight += weight;
        }

        if total_weight <= 0.0 {
            tracing::debug!("All {} sentiment items carry zero weight", items.len());
            return Ok(SentimentScore {
                item_count: items.len(),
                ..SentimentScore::neutral(half_life)
            });
        }

        let score = clamp_unit(weighted_sum / total_weight);
        let confidence = (total_weight / self.config.saturation_weight).min(1.0);

        tracing::info!(
            "Sentiment score {:+.3} from {} items (weight {:.3}, confidence {:.2})",
            score,
            items.len(),
            total_weight,
            confidence
        );

        Ok(SentimentScore {
            score,
            confidence,
            item_count: items.len(),
            total_weight,
            half_life_hours: half_life,
        })
    }
}

impl SentimentAnalyzer for SentimentAnalysisEngine {
    fn analyze(&self, items: &[SentimentItem], as_of: DateTime<Utc>) -> Result<SentimentScore, AnalysisError> {
        self.analyze_sync(items, as_of)
    }
}

impl Default for SentimentAnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}
