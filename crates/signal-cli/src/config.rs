use std::env;
use std::path::Path;
use std::str::FromStr;

use analysis_orchestrator::EngineConfig;
use anyhow::{Context, Result};

/// Load the engine configuration from a JSON file.
pub fn from_file(path: &Path) -> Result<EngineConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing config file {}", path.display()))
}

/// Defaults overridden by environment variables.
pub fn from_env() -> Result<EngineConfig> {
    from_lookup(|key| env::var(key).ok())
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value `{}`", key, raw)),
        None => Ok(default),
    }
}

pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<EngineConfig> {
    let mut config = EngineConfig::default();

    config.weights.technical = parse_or(&lookup, "WEIGHT_TECHNICAL", config.weights.technical)?;
    config.weights.fundamental = parse_or(&lookup, "WEIGHT_FUNDAMENTAL", config.weights.fundamental)?;
    config.weights.sentiment = parse_or(&lookup, "WEIGHT_SENTIMENT", config.weights.sentiment)?;

    config.risk.account_equity = parse_or(&lookup, "ACCOUNT_EQUITY", config.risk.account_equity)?;
    config.risk.max_risk_per_trade = parse_or(&lookup, "MAX_RISK_PER_TRADE", config.risk.max_risk_per_trade)?;
    config.risk.stop_multiple = parse_or(&lookup, "STOP_ATR_MULTIPLE", config.risk.stop_multiple)?;
    config.risk.max_exposure_fraction =
        parse_or(&lookup, "MAX_EXPOSURE_FRACTION", config.risk.max_exposure_fraction)?;

    config.sentiment.half_life_hours =
        parse_or(&lookup, "SENTIMENT_HALF_LIFE_HOURS", config.sentiment.half_life_hours)?;
    config.fundamental.pe_benchmark = parse_or(&lookup, "PE_BENCHMARK", config.fundamental.pe_benchmark)?;

    Ok(config)
}
