use analysis_core::{
    validate_price_history, AnalysisError, Component, FundamentalAnalyzer, FundamentalMetrics, PillarScore,
    PillarSignal, PricePoint, RiskDecision, SentimentAnalyzer, SentimentItem, TechnicalAnalyzer,
    UnifiedAnalysis,
};
use chrono::{DateTime, Utc};
use fundamental_analysis::{FundamentalAnalysisEngine, FundamentalConfig};
use risk_manager::{estimate_volatility, RiskConfig, RiskSizer};
use sentiment_analysis::{SentimentAnalysisEngine, SentimentConfig};
use serde::{Deserialize, Serialize};
use technical_analysis::{TechnicalAnalysisEngine, TechnicalConfig};

pub mod composer;
pub use composer::{ScoreComposer, SignalBands, WeightsConfig};

/// Every tunable of the pipeline in one place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub technical: TechnicalConfig,
    pub fundamental: FundamentalConfig,
    pub sentiment: SentimentConfig,
    pub weights: WeightsConfig,
    pub bands: SignalBands,
    pub risk: RiskConfig,
}

/// A pillar's output, or `None` with a zero-confidence score when it was excluded.
struct PillarOutcome<T> {
    output: Option<T>,
    score: PillarScore,
}

pub struct AnalysisOrchestrator {
    technical_analyzer: TechnicalAnalysisEngine,
    fundamental_analyzer: FundamentalAnalysisEngine,
    sentiment_analyzer: SentimentAnalysisEngine,
    composer: ScoreComposer,
    risk_sizer: RiskSizer,
}

impl AnalysisOrchestrator {
    pub fn new() -> Self {
        Self {
            technical_analyzer: TechnicalAnalysisEngine::new(),
            fundamental_analyzer: FundamentalAnalysisEngine::new(),
            sentiment_analyzer: SentimentAnalysisEngine::new(),
            composer: ScoreComposer::new(),
            risk_sizer: RiskSizer::default(),
        }
    }

    /// Build every engine from `config`, validating each section.
    pub fn from_config(config: &EngineConfig) -> Result<Self, AnalysisError> {
        Ok(Self {
            technical_analyzer: TechnicalAnalysisEngine::with_config(config.technical.clone())?,
            fundamental_analyzer: FundamentalAnalysisEngine::with_config(config.fundamental.clone())?,
            sentiment_analyzer: SentimentAnalysisEngine::with_config(config.sentiment.clone())?,
            composer: ScoreComposer::with_config(config.weights.clone(), config.bands.clone())?,
            risk_sizer: RiskSizer::new(config.risk.clone())?,
        })
    }

    pub fn technical_engine(&self) -> &TechnicalAnalysisEngine {
        &self.technical_analyzer
    }

    pub fn composer(&self) -> &ScoreComposer {
        &self.composer
    }

    pub fn risk_sizer(&self) -> &RiskSizer {
        &self.risk_sizer
    }

    /// Score the asset and size a position; pillar detail is discarded.
    pub fn evaluate(
        &self,
        asset_id: &str,
        prices: &[PricePoint],
        metrics: &FundamentalMetrics,
        items: &[SentimentItem],
        as_of: DateTime<Utc>,
    ) -> Result<RiskDecision, AnalysisError> {
        self.evaluate_detailed(asset_id, prices, metrics, items, as_of)
            .map(|analysis| analysis.decision)
    }

    /// Run all stages and keep every intermediate output.
    ///
    /// The three pillars run concurrently. A pillar that fails for lack of
    /// usable data is excluded with zero confidence and the composer
    /// renormalizes around it; configuration errors and `NoSignal` abort.
    /// The price history is validated up front because the risk stage needs
    /// it regardless of whether the technical pillar survives.
    pub fn evaluate_detailed(
        &self,
        asset_id: &str,
        prices: &[PricePoint],
        metrics: &FundamentalMetrics,
        items: &[SentimentItem],
        as_of: DateTime<Utc>,
    ) -> Result<UnifiedAnalysis, AnalysisError> {
        tracing::info!(
            "Starting evaluation for {} as of {} ({} bars, {} sentiment items)",
            asset_id,
            as_of,
            prices.len(),
            items.len()
        );

        validate_price_history(Component::Risk, prices, as_of)?;

        let (technical_result, (fundamental_score, sentiment_result)) = rayon::join(
            || self.technical_analyzer.analyze(asset_id, prices, as_of),
            || {
                rayon::join(
                    || self.fundamental_analyzer.analyze(metrics),
                    || self.sentiment_analyzer.analyze(items, as_of),
                )
            },
        );

        let mut excluded_pillars = Vec::new();
        let technical = recover(Component::Technical, technical_result, &mut excluded_pillars)?;
        let sentiment = recover(Component::Sentiment, sentiment_result, &mut excluded_pillars)?;
        let fundamental_pillar = fundamental_score.pillar_score();
        if fundamental_score.confidence == 0.0 {
            tracing::warn!("{}: no fundamental metrics available, pillar carries no weight", asset_id);
        }

        let composite = self.composer.compose(
            asset_id,
            as_of,
            technical.score,
            fundamental_pillar,
            sentiment.score,
        )?;

        let volatility = estimate_volatility(prices, self.risk_sizer.config().volatility)?;
        let entry_price = match prices.last() {
            Some(last) => last.close,
            None => return Err(AnalysisError::insufficient(Component::Risk, "price_history", 1, 0)),
        };
        let decision = self.risk_sizer.size(composite, volatility, entry_price)?;

        tracing::info!(
            "{}: {} -> {:.4} units, stop {:.4}",
            asset_id,
            decision.composite.recommendation,
            decision.position_size,
            decision.stop_loss
        );

        Ok(UnifiedAnalysis {
            asset_id: asset_id.to_string(),
            as_of,
            technical: technical.output,
            fundamental: Some(fundamental_score),
            sentiment: sentiment.output,
            excluded_pillars,
            decision,
        })
    }
}

impl Default for AnalysisOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

fn recover<T: PillarSignal>(
    component: Component,
    result: Result<T, AnalysisError>,
    excluded: &mut Vec<(Component, String)>,
) -> Result<PillarOutcome<T>, AnalysisError> {
    match result {
        Ok(output) => Ok(PillarOutcome {
            score: output.pillar_score(),
            output: Some(output),
        }),
        Err(e) if e.is_recoverable() => {
            tracing::warn!("{} pillar excluded: {}", component, e);
            excluded.push((component, e.to_string()));
            Ok(PillarOutcome {
                output: None,
                score: PillarScore::excluded(),
            })
        }
        Err(e) => Err(e),
    }
}

/// One-shot evaluation with default engine settings and the given weights and risk parameters.
pub fn evaluate(
    asset_id: &str,
    price_history: &[PricePoint],
    fundamental_metrics: &FundamentalMetrics,
    sentiment_items: &[SentimentItem],
    weights_config: &WeightsConfig,
    risk_config: &RiskConfig,
    as_of: DateTime<Utc>,
) -> Result<RiskDecision, AnalysisError> {
    let config = EngineConfig {
        weights: weights_config.clone(),
        risk: risk_config.clone(),
        ..EngineConfig::default()
    };
    AnalysisOrchestrator::from_config(&config)?.evaluate(
        asset_id,
        price_history,
        fundamental_metrics,
        sentiment_items,
        as_of,
    )
}
