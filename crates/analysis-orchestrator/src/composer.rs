use analysis_core::stats::{clamp_fraction, clamp_unit};
use analysis_core::{
    AnalysisError, Component, CompositeScore, PillarScore, PillarWeights, SignalStrength,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Nominal pillar weights. They need not sum to 1; the composer renormalizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeightsConfig {
    pub technical: f64,
    pub fundamental: f64,
    pub sentiment: f64,
}

impl Default for WeightsConfig {
    fn default() -> Self {
        Self {
            technical: 0.6,
            fundamental: 0.25,
            sentiment: 0.15,
        }
    }
}

impl WeightsConfig {
    pub fn new(technical: f64, fundamental: f64, sentiment: f64) -> Self {
        Self {
            technical,
            fundamental,
            sentiment,
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        for (name, value) in [
            ("weights.technical", self.technical),
            ("weights.fundamental", self.fundamental),
            ("weights.sentiment", self.sentiment),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AnalysisError::invalid_config(
                    Component::Composer,
                    name,
                    format!("must be a finite non-negative number, got {}", value),
                ));
            }
        }
        Ok(())
    }

    pub fn as_pillar_weights(&self) -> PillarWeights {
        PillarWeights {
            technical: self.technical,
            fundamental: self.fundamental,
            sentiment: self.sentiment,
        }
    }
}

/// Composite score cut-offs for the five signal bands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalBands {
    pub strong_buy: f64,
    pub buy: f64,
    pub sell: f64,
    pub strong_sell: f64,
}

impl Default for SignalBands {
    fn default() -> Self {
        Self {
            strong_buy: 0.6,
            buy: 0.2,
            sell: -0.2,
            strong_sell: -0.6,
        }
    }
}

impl SignalBands {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let cuts = [
            ("bands.strong_sell", self.strong_sell),
            ("bands.sell", self.sell),
            ("bands.buy", self.buy),
            ("bands.strong_buy", self.strong_buy),
        ];
        for (name, value) in cuts {
            if !value.is_finite() || !(-1.0..=1.0).contains(&value) {
                return Err(AnalysisError::invalid_config(
                    Component::Composer,
                    name,
                    format!("must be within [-1, 1], got {}", value),
                ));
            }
        }
        for pair in cuts.windows(2) {
            if pair[0].1 >= pair[1].1 {
                return Err(AnalysisError::invalid_config(
                    Component::Composer,
                    pair[1].0,
                    format!("must be greater than {} ({} <= {})", pair[0].0, pair[1].1, pair[0].1),
                ));
            }
        }
        Ok(())
    }

    /// Map a composite score onto a signal. Boundaries belong to the more bullish band
    /// on the buy side and to Hold/Sell on the sell side.
    pub fn classify(&self, score: f64) -> SignalStrength {
        if score >= self.strong_buy {
            SignalStrength::StrongBuy
        } else if score >= self.buy {
            SignalStrength::Buy
        } else if score > self.sell {
            SignalStrength::Hold
        } else if score > self.strong_sell {
            SignalStrength::Sell
        } else {
            SignalStrength::StrongSell
        }
    }
}

/// Blends the three pillar scores into one composite and a discrete signal.
pub struct ScoreComposer {
    weights: WeightsConfig,
    bands: SignalBands,
}

impl ScoreComposer {
    pub fn new() -> Self {
        Self {
            weights: WeightsConfig::default(),
            bands: SignalBands::default(),
        }
    }

    pub fn with_config(weights: WeightsConfig, bands: SignalBands) -> Result<Self, AnalysisError> {
        weights.validate()?;
        bands.validate()?;
        Ok(Self { weights, bands })
    }

    pub fn weights(&self) -> &WeightsConfig {
        &self.weights
    }

    pub fn bands(&self) -> &SignalBands {
        &self.bands
    }

    /// Effective weights: nominal × confidence, renormalized to sum to 1.
    pub fn effective_weights(
        &self,
        technical: &PillarScore,
        fundamental: &PillarScore,
        sentiment: &PillarScore,
    ) -> Result<PillarWeights, AnalysisError> {
        let raw = PillarWeights {
            technical: self.weights.technical * clamp_fraction(technical.confidence),
            fundamental: self.weights.fundamental * clamp_fraction(fundamental.confidence),
            sentiment: self.weights.sentiment * clamp_fraction(sentiment.confidence),
        };
        let total = raw.total();
        if total <= 0.0 {
            return Err(AnalysisError::NoSignal {
                pillars: vec![Component::Technical, Component::Fundamental, Component::Sentiment],
            });
        }
        Ok(PillarWeights {
            technical: raw.technical / total,
            fundamental: raw.fundamental / total,
            sentiment: raw.sentiment / total,
        })
    }

    pub fn compose(
        &self,
        asset_id: &str,
        as_of: DateTime<Utc>,
        technical: PillarScore,
        fundamental: PillarScore,
        sentiment: PillarScore,
    ) -> Result<CompositeScore, AnalysisError> {
        let weights = self.effective_weights(&technical, &fundamental, &sentiment)?;

        let score = clamp_unit(
            weights.technical * clamp_unit(technical.score)
                + weights.fundamental * clamp_unit(fundamental.score)
                + weights.sentiment * clamp_unit(sentiment.score),
        );
        let signal = self.bands.classify(score);
        let confidence = self.overall_confidence(&technical, &fundamental, &sentiment);

        tracing::info!(
            "{}: composite {:+.3} -> {:?} (weights t={:.2} f={:.2} s={:.2})",
            asset_id,
            score,
            signal,
            weights.technical,
            weights.fundamental,
            weights.sentiment
        );

        Ok(CompositeScore {
            asset_id: asset_id.to_string(),
            as_of,
            technical,
            fundamental,
            sentiment,
            effective_weights: weights,
            score,
            signal,
            recommendation: generate_recommendation(signal, confidence),
        })
    }

    /// Share of nominal weight backed by data, less a penalty when pillars disagree.
    fn overall_confidence(&self, technical: &PillarScore, fundamental: &PillarScore, sentiment: &PillarScore) -> f64 {
        let nominal = self.weights.as_pillar_weights();
        let total = nominal.total();
        if total <= 0.0 {
            return 0.0;
        }
        let coverage = (nominal.technical * clamp_fraction(technical.confidence)
            + nominal.fundamental * clamp_fraction(fundamental.confidence)
            + nominal.sentiment * clamp_fraction(sentiment.confidence))
            / total;

        let live: Vec<f64> = [technical, fundamental, sentiment]
            .iter()
            .filter(|p| p.confidence > 0.0)
            .map(|p| clamp_unit(p.score))
            .collect();
        let has_bullish = live.iter().any(|&s| s >= 0.3);
        let has_bearish = live.iter().any(|&s| s <= -0.3);
        let conflict_penalty = if has_bullish && has_bearish {
            let max = live.iter().cloned().fold(f64::MIN, f64::max);
            let min = live.iter().cloned().fold(f64::MAX, f64::min);
            (max - min) / 2.0 * 0.30
        } else {
            0.0
        };

        clamp_fraction(coverage - conflict_penalty)
    }
}

impl Default for ScoreComposer {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_recommendation(signal: SignalStrength, confidence: f64) -> String {
    let confidence_desc = if confidence > 0.8 {
        "high"
    } else if confidence > 0.6 {
        "moderate"
    } else if confidence > 0.4 {
        "low"
    } else {
        "very low"
    };

    format!(
        "{} (confidence: {} - {:.0}%)",
        signal.to_label(),
        confidence_desc,
        confidence * 100.0
    )
}
