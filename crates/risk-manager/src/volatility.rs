use analysis_core::{AnalysisError, Component, PricePoint};
use technical_analysis::indicators::{atr, returns_std_dev};

use crate::models::VolatilityMethod;

/// Volatility estimate in price units from the most recent window of `prices`.
pub fn estimate_volatility(prices: &[PricePoint], method: VolatilityMethod) -> Result<f64, AnalysisError> {
    method.validate()?;

    let required = method.min_bars();
    if prices.len() < required {
        return Err(AnalysisError::insufficient(
            Component::Risk,
            "volatility",
            required,
            prices.len(),
        ));
    }

    let estimate = match method {
        VolatilityMethod::Atr { period } => atr(prices, period).last().copied(),
        VolatilityMethod::ReturnsStdDev { lookback } => {
            let closes: Vec<f64> = prices.iter().map(|p| p.close).collect();
            let last_close = closes.last().copied().unwrap_or(0.0);
            returns_std_dev(&closes, lookback).map(|sd| sd * last_close)
        }
    };

    match estimate {
        Some(value) => {
            tracing::debug!("Volatility estimate ({:?}): {:.4}", method, value);
            Ok(value)
        }
        None => Err(AnalysisError::insufficient(
            Component::Risk,
            "volatility",
            required,
            prices.len(),
        )),
    }
}
