use std::collections::BTreeMap;

use analysis_core::stats::clamp_unit;
use analysis_core::{
    validate_price_history, AnalysisError, Component, ExcludedIndicator, IndicatorReading, PricePoint,
    TechnicalAnalyzer, TechnicalSnapshot,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::indicators::*;

const SHORT_MA: usize = 20;
const LONG_MA: usize = 50;
/// SMA20/SMA50 spread that maps to a full +/-1 contribution
const MA_SPREAD_SATURATION: f64 = 0.05;

const RSI_PERIOD: usize = 14;
const RSI_OVERBOUGHT: f64 = 70.0;
const RSI_OVERSOLD: f64 = 30.0;

const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;
/// Histogram as a fraction of price that maps to a full +/-1 contribution
const MACD_SATURATION: f64 = 0.01;

const BB_PERIOD: usize = 20;
const BB_STD_DEV: f64 = 2.0;

const ADX_PERIOD: usize = 14;
/// ADX below this carries no directional weight
const ADX_TREND_FLOOR: f64 = 20.0;
/// ADX above this carries full directional weight
const ADX_TREND_FULL: f64 = 40.0;

/// The fixed technical indicator set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    /// SMA20 vs SMA50 spread
    MaTrend,
    /// 14-period RSI, contrarian at the 30/70 bounds
    Rsi,
    /// MACD(12, 26, 9) histogram
    Macd,
    /// Bollinger %B (20, 2 sigma), contrarian at the bands
    Bollinger,
    /// 14-period ADX signed by the dominant directional index
    Adx,
}

impl Indicator {
    pub const ALL: [Indicator; 5] = [
        Indicator::MaTrend,
        Indicator::Rsi,
        Indicator::Macd,
        Indicator::Bollinger,
        Indicator::Adx,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Indicator::MaTrend => "ma_trend",
            Indicator::Rsi => "rsi_14",
            Indicator::Macd => "macd_histogram",
            Indicator::Bollinger => "bollinger_percent_b",
            Indicator::Adx => "adx_14",
        }
    }

    /// Minimum number of price points needed for one reading
    pub fn min_bars(&self) -> usize {
        match self {
            Indicator::MaTrend => LONG_MA,
            Indicator::Rsi => RSI_PERIOD + 1,
            Indicator::Macd => MACD_SLOW + MACD_SIGNAL - 1,
            Indicator::Bollinger => BB_PERIOD,
            Indicator::Adx => ADX_PERIOD * 2,
        }
    }

    /// Fixed internal weight before redistribution; the full set sums to 1.
    pub fn weight(&self) -> f64 {
        match self {
            Indicator::MaTrend => 0.25,
            Indicator::Rsi => 0.20,
            Indicator::Macd => 0.15,
            Indicator::Bollinger => 0.20,
            Indicator::Adx => 0.20,
        }
    }

    /// Compute (raw value, normalized contribution) from the latest bar.
    pub fn compute(&self, prices: &[PricePoint]) -> Result<(f64, f64), AnalysisError> {
        if prices.len() < self.min_bars() {
            return Err(AnalysisError::insufficient(
                Component::Technical,
                self.name(),
                self.min_bars(),
                prices.len(),
            ));
        }
        let closes: Vec<f64> = prices.iter().map(|p| p.close).collect();
        let closes = closes.as_slice();
        let last_close = prices[prices.len() - 1].close;

        match self {
            Indicator::MaTrend => {
                let short = last(&sma(closes, SHORT_MA), *self)?;
                let long = last(&sma(closes, LONG_MA), *self)?;
                if long <= 0.0 {
                    return Err(self.invalid("long moving average is not positive"));
                }
                let spread = (short - long) / long;
                Ok((spread, clamp_unit(spread / MA_SPREAD_SATURATION)))
            }
            Indicator::Rsi => {
                let value = last(&rsi(closes, RSI_PERIOD), *self)?;
                let mid = (RSI_OVERBOUGHT + RSI_OVERSOLD) / 2.0;
                let half_band = (RSI_OVERBOUGHT - RSI_OVERSOLD) / 2.0;
                Ok((value, clamp_unit((mid - value) / half_band)))
            }
            Indicator::Macd => {
                let result = macd(closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);
                let hist = last(&result.histogram, *self)?;
                if last_close <= 0.0 {
                    return Err(self.invalid("last close is not positive"));
                }
                Ok((hist, clamp_unit(hist / (last_close * MACD_SATURATION))))
            }
            Indicator::Bollinger => {
                let bands = bollinger_bands(closes, BB_PERIOD, BB_STD_DEV);
                let upper = last(&bands.upper, *self)?;
                let lower = last(&bands.lower, *self)?;
                let width = upper - lower;
                // A flat window sits exactly mid-band
                let percent_b = if width > f64::EPSILON { (last_close - lower) / width } else { 0.5 };
                Ok((percent_b, clamp_unit(1.0 - 2.0 * percent_b)))
            }
            Indicator::Adx => {
                let result = adx(prices, ADX_PERIOD);
                let value = last(&result.adx, *self)?;
                let pdi = last(&result.plus_di, *self)?;
                let mdi = last(&result.minus_di, *self)?;
                let strength = ((value - ADX_TREND_FLOOR) / (ADX_TREND_FULL - ADX_TREND_FLOOR)).clamp(0.0, 1.0);
                let direction = if pdi > mdi {
                    1.0
                } else if mdi > pdi {
                    -1.0
                } else {
                    0.0
                };
                Ok((value, direction * strength))
            }
        }
    }

    fn invalid(&self, reason: &str) -> AnalysisError {
        AnalysisError::InvalidData {
            component: Component::Technical,
            subject: self.name().to_string(),
            reason: reason.to_string(),
        }
    }
}

fn last(series: &[f64], indicator: Indicator) -> Result<f64, AnalysisError> {
    series.last().copied().ok_or_else(|| {
        AnalysisError::insufficient(Component::Technical, indicator.name(), indicator.min_bars(), 0)
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TechnicalConfig {
    pub enabled: Vec<Indicator>,
}

impl Default for TechnicalConfig {
    fn default() -> Self {
        Self {
            enabled: Indicator::ALL.to_vec(),
        }
    }
}

impl TechnicalConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.enabled.is_empty() {
            return Err(AnalysisError::invalid_config(
                Component::Technical,
                "enabled",
                "at least one indicator must be enabled",
            ));
        }
        for (i, indicator) in self.enabled.iter().enumerate() {
            if self.enabled[..i].contains(indicator) {
                return Err(AnalysisError::invalid_config(
                    Component::Technical,
                    "enabled",
                    format!("indicator `{}` listed twice", indicator.name()),
                ));
            }
        }
        Ok(())
    }
}

pub struct TechnicalAnalysisEngine {
    config: TechnicalConfig,
}

impl TechnicalAnalysisEngine {
    pub fn new() -> Self {
        Self {
            config: TechnicalConfig::default(),
        }
    }

    pub fn with_config(config: TechnicalConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &TechnicalConfig {
        &self.config
    }

    fn analyze_sync(
        &self,
        asset_id: &str,
        prices: &[PricePoint],
        as_of: DateTime<Utc>,
    ) -> Result<TechnicalSnapshot, AnalysisError> {
        validate_price_history(Component::Technical, prices, as_of)?;

        let mut computed: Vec<(Indicator, f64, f64)> = Vec::new();
        let mut excluded = Vec::new();

        for indicator in &self.config.enabled {
            match indicator.compute(prices) {
                Ok((value, contribution)) => {
                    tracing::debug!(
                        "{}: {} = {:.4} (contribution {:+.3})",
                        asset_id,
                        indicator.name(),
                        value,
                        contribution
                    );
                    computed.push((*indicator, value, contribution));
                }
                Err(e) if e.is_recoverable() => {
                    tracing::warn!("{}: excluding indicator {}: {}", asset_id, indicator.name(), e);
                    excluded.push(ExcludedIndicator {
                        name: indicator.name().to_string(),
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }

        if computed.is_empty() {
            let required = self.config.enabled.iter().map(Indicator::min_bars).min().unwrap_or(0);
            return Err(AnalysisError::insufficient(
                Component::Technical,
                "indicators",
                required,
                prices.len(),
            ));
        }

        // Redistribute the weight of excluded indicators proportionally
        let included_weight: f64 = computed.iter().map(|(i, _, _)| i.weight()).sum();
        let mut indicators = BTreeMap::new();
        let mut score = 0.0;
        for (indicator, value, contribution) in computed {
            let effective_weight = indicator.weight() / included_weight;
            score += effective_weight * contribution;
            indicators.insert(
                indicator.name().to_string(),
                IndicatorReading {
                    value,
                    contribution,
                    nominal_weight: indicator.weight(),
                    effective_weight,
                },
            );
        }
        let score = clamp_unit(score);

        tracing::info!(
            "{}: technical score {:+.3} from {} indicators ({} excluded)",
            asset_id,
            score,
            indicators.len(),
            excluded.len()
        );

        Ok(TechnicalSnapshot {
            asset_id: asset_id.to_string(),
            as_of,
            indicators,
            excluded,
            score,
            confidence: 1.0,
        })
    }
}

impl TechnicalAnalyzer for TechnicalAnalysisEngine {
    fn analyze(
        &self,
        asset_id: &str,
        prices: &[PricePoint],
        as_of: DateTime<Utc>,
    ) -> Result<TechnicalSnapshot, AnalysisError> {
        self.analyze_sync(asset_id, prices, as_of)
    }
}

impl Default for TechnicalAnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone};

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn series(closes: &[f64]) -> Vec<PricePoint> {
        let n = closes.len() as i64;
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint {
                timestamp: as_of() - Duration::days(n - i as i64),
                open: close,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume: 1_000_000.0,
            })
            .collect()
    }

    fn trending(n: usize, start: f64, step: f64) -> Vec<PricePoint> {
        let closes: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
        series(&closes)
    }

    #[test]
    fn test_weights_sum_to_one() {
        let total: f64 = Indicator::ALL.iter().map(Indicator::weight).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_full_history_uses_every_indicator() {
        let engine = TechnicalAnalysisEngine::new();
        let snapshot = engine.analyze("AAPL", &trending(120, 100.0, 0.5), as_of()).unwrap();

        assert_eq!(snapshot.indicators.len(), 5);
        assert!(snapshot.excluded.is_empty());
        assert_eq!(snapshot.confidence, 1.0);
        assert!(snapshot.score >= -1.0 && snapshot.score <= 1.0);
        let effective: f64 = snapshot.indicators.values().map(|r| r.effective_weight).sum();
        assert_relative_eq!(effective, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_uptrend_reads_bullish_trend() {
        let engine = TechnicalAnalysisEngine::new();
        let snapshot = engine.analyze("AAPL", &trending(120, 100.0, 0.5), as_of()).unwrap();

        assert!(snapshot.indicators["ma_trend"].contribution > 0.0);
        assert!(snapshot.indicators["adx_14"].contribution > 0.0);
        // A relentless uptrend is overbought for the oscillator
        assert!(snapshot.indicators["rsi_14"].contribution < 0.0);
    }

    #[test]
    fn test_short_history_redistributes_weight() {
        let engine = TechnicalAnalysisEngine::new();
        // 30 bars: enough for RSI, Bollinger and ADX but not MA trend (50) or MACD (34)
        let snapshot = engine.analyze("AAPL", &trending(30, 100.0, 0.2), as_of()).unwrap();

        let names: Vec<&str> = snapshot.excluded.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["ma_trend", "macd_histogram"]);
        assert_eq!(snapshot.indicators.len(), 3);

        let rsi_reading = &snapshot.indicators["rsi_14"];
        assert_relative_eq!(rsi_reading.effective_weight, 0.20 / 0.60, epsilon = 1e-12);
        let effective: f64 = snapshot.indicators.values().map(|r| r.effective_weight).sum();
        assert_relative_eq!(effective, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_too_short_for_any_indicator() {
        let engine = TechnicalAnalysisEngine::new();
        let err = engine.analyze("AAPL", &trending(10, 100.0, 0.2), as_of()).unwrap_err();
        match err {
            AnalysisError::InsufficientData { component, required, available, .. } => {
                assert_eq!(component, Component::Technical);
                assert_eq!(required, 15);
                assert_eq!(available, 10);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_disabled_indicators_are_not_reported() {
        let config = TechnicalConfig {
            enabled: vec![Indicator::Rsi, Indicator::Bollinger],
        };
        let engine = TechnicalAnalysisEngine::with_config(config).unwrap();
        let snapshot = engine.analyze("AAPL", &trending(60, 50.0, -0.1), as_of()).unwrap();
        assert_eq!(snapshot.indicators.len(), 2);
        assert!(snapshot.excluded.is_empty());
        assert_relative_eq!(snapshot.indicators["rsi_14"].effective_weight, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_config_validation() {
        assert!(TechnicalAnalysisEngine::with_config(TechnicalConfig { enabled: vec![] }).is_err());
        let dup = TechnicalConfig {
            enabled: vec![Indicator::Rsi, Indicator::Rsi],
        };
        assert!(TechnicalAnalysisEngine::with_config(dup).is_err());
    }

    #[test]
    fn test_unordered_history_is_rejected() {
        let mut prices = trending(60, 100.0, 0.1);
        prices.swap(10, 11);
        let err = TechnicalAnalysisEngine::new().analyze("AAPL", &prices, as_of()).unwrap_err();
        assert!(matches!(err, AnalysisError::InvalidData { .. }));
    }

    #[test]
    fn test_rsi_bounds_map_to_extremes() {
        // Strictly falling closes drive RSI to 0, i.e. deeply oversold
        let prices = trending(20, 100.0, -1.0);
        let (value, contribution) = Indicator::Rsi.compute(&prices).unwrap();
        assert!(value < RSI_OVERSOLD);
        assert_eq!(contribution, 1.0);
    }

    #[test]
    fn test_flat_market_is_neutral_on_bands() {
        let prices = series(&[42.0; 25]);
        let (percent_b, contribution) = Indicator::Bollinger.compute(&prices).unwrap();
        assert_eq!(percent_b, 0.5);
        assert_eq!(contribution, 0.0);
    }

    #[test]
    fn test_compute_on_empty_history_is_insufficient() {
        for indicator in Indicator::ALL {
            match indicator.compute(&[]) {
                Err(AnalysisError::InsufficientData { available, required, .. }) => {
                    assert_eq!(available, 0);
                    assert_eq!(required, indicator.min_bars());
                }
                other => panic!("{}: expected insufficient data, got {:?}", indicator.name(), other),
            }
        }
    }
}
