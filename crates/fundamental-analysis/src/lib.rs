use std::collections::BTreeMap;

use analysis_core::stats::{clamp_unit, weighted_average};
use analysis_core::{AnalysisError, Component, FundamentalAnalyzer, FundamentalMetrics, FundamentalScore};
use serde::{Deserialize, Serialize};

pub const PE_RATIO: &str = "pe_ratio";
pub const PEG_RATIO: &str = "peg_ratio";
pub const DEBT_TO_EQUITY: &str = "debt_to_equity";
pub const REVENUE_GROWTH_PCT: &str = "revenue_growth_pct";
pub const EARNINGS_GROWTH_PCT: &str = "earnings_growth_pct";
pub const RETURN_ON_EQUITY_PCT: &str = "return_on_equity_pct";
pub const PROFIT_MARGIN_PCT: &str = "profit_margin_pct";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    LowerIsBetter,
    HigherIsBetter,
}

/// Normalization curve for one metric.
///
/// The curve is `tanh((benchmark - x) / scale)` for lower-is-better metrics and
/// `tanh((x - benchmark) / scale)` otherwise, so the benchmark maps to 0 and
/// each further unit matters less than the one before.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricRule {
    pub name: &'static str,
    pub direction: Direction,
    pub benchmark: f64,
    pub scale: f64,
    pub weight: f64,
    /// Valuation multiples are meaningless for loss-makers; those read as -1.
    pub non_positive_is_worst: bool,
}

impl MetricRule {
    pub fn normalize(&self, value: f64) -> f64 {
        if self.non_positive_is_worst && value <= 0.0 {
            return -1.0;
        }
        let distance = match self.direction {
            Direction::LowerIsBetter => self.benchmark - value,
            Direction::HigherIsBetter => value - self.benchmark,
        };
        clamp_unit((distance / self.scale).tanh())
    }
}

/// Sector-dependent benchmarks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FundamentalConfig {
    pub pe_benchmark: f64,
    pub debt_to_equity_benchmark: f64,
}

impl Default for FundamentalConfig {
    fn default() -> Self {
        Self {
            pe_benchmark: 20.0,
            debt_to_equity_benchmark: 1.0,
        }
    }
}

impl FundamentalConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        for (name, value) in [
            ("pe_benchmark", self.pe_benchmark),
            ("debt_to_equity_benchmark", self.debt_to_equity_benchmark),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(AnalysisError::invalid_config(
                    Component::Fundamental,
                    name,
                    format!("must be a positive number, got {}", value),
                ));
            }
        }
        Ok(())
    }

    /// The expected metric set with its curves
    pub fn rules(&self) -> Vec<MetricRule> {
        vec![
            MetricRule {
                name: PE_RATIO,
                direction: Direction::LowerIsBetter,
                benchmark: self.pe_benchmark,
                scale: 15.0,
                weight: 1.0,
                non_positive_is_worst: true,
            },
            MetricRule {
                name: PEG_RATIO,
                direction: Direction::LowerIsBetter,
                benchmark: 1.0,
                scale: 1.0,
                weight: 1.0,
                non_positive_is_worst: true,
            },
            MetricRule {
                name: DEBT_TO_EQUITY,
                direction: Direction::LowerIsBetter,
                benchmark: self.debt_to_equity_benchmark,
                scale: 1.0,
                weight: 1.0,
                non_positive_is_worst: false,
            },
            MetricRule {
                name: REVENUE_GROWTH_PCT,
                direction: Direction::HigherIsBetter,
                benchmark: 5.0,
                scale: 15.0,
                weight: 1.0,
                non_positive_is_worst: false,
            },
            MetricRule {
                name: EARNINGS_GROWTH_PCT,
                direction: Direction::HigherIsBetter,
                benchmark: 5.0,
                scale: 15.0,
                weight: 1.0,
                non_positive_is_worst: false,
            },
            MetricRule {
                name: RETURN_ON_EQUITY_PCT,
                direction: Direction::HigherIsBetter,
                benchmark: 12.0,
                scale: 10.0,
                weight: 0.75,
                non_positive_is_worst: false,
            },
            MetricRule {
                name: PROFIT_MARGIN_PCT,
                direction: Direction::HigherIsBetter,
                benchmark: 10.0,
                scale: 10.0,
                weight: 0.75,
                non_positive_is_worst: false,
            },
        ]
    }
}

/// Raw statement figures the ratio metrics can be derived from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialStatement {
    pub price: Option<f64>,
    pub eps: Option<f64>,
    pub prior_eps: Option<f64>,
    pub revenue: Option<f64>,
    pub prior_revenue: Option<f64>,
    pub net_income: Option<f64>,
    pub total_liabilities: Option<f64>,
    pub shareholders_equity: Option<f64>,
}

pub struct FundamentalAnalysisEngine {
    config: FundamentalConfig,
    rules: Vec<MetricRule>,
}

impl FundamentalAnalysisEngine {
    pub fn new() -> Self {
        let config = FundamentalConfig::default();
        let rules = config.rules();
        Self { config, rules }
    }

    pub fn with_config(config: FundamentalConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        let rules = config.rules();
        Ok(Self { config, rules })
    }

    pub fn config(&self) -> &FundamentalConfig {
        &self.config
    }

    pub fn rules(&self) -> &[MetricRule] {
        &self.rules
    }

    fn calculate_pe_ratio(&self, price: f64, eps: f64) -> Option<f64> {
        if eps != 0.0 {
            Some(price / eps)
        } else {
            None
        }
    }

    fn calculate_growth_pct(&self, current: f64, prior: f64) -> Option<f64> {
        if prior > 0.0 {
            Some((current - prior) / prior * 100.0)
        } else {
            None
        }
    }

    fn calculate_debt_to_equity(&self, liabilities: f64, equity: f64) -> Option<f64> {
        if equity > 0.0 {
            Some(liabilities / equity)
        } else {
            None
        }
    }

    fn calculate_roe(&self, net_income: f64, equity: f64) -> Option<f64> {
        if equity > 0.0 {
            Some((net_income / equity) * 100.0)
        } else {
            None
        }
    }

    fn calculate_profit_margin(&self, net_income: f64, revenue: f64) -> Option<f64> {
        if revenue > 0.0 {
            Some((net_income / revenue) * 100.0)
        } else {
            None
        }
    }

    /// Build the metric map from raw statement figures. Ratios whose inputs are
    /// missing or undefined stay `None`.
    pub fn derive_metrics(&self, asset_id: &str, period: &str, statement: &FinancialStatement) -> FundamentalMetrics {
        let pe = match (statement.price, statement.eps) {
            (Some(price), Some(eps)) => self.calculate_pe_ratio(price, eps),
            _ => None,
        };
        let earnings_growth = match (statement.eps, statement.prior_eps) {
            (Some(eps), Some(prior)) => self.calculate_growth_pct(eps, prior),
            _ => None,
        };
        let peg = match (pe, earnings_growth) {
            (Some(pe), Some(growth)) if pe > 0.0 && growth > 0.0 => Some(pe / growth),
            // Shrinking earnings make the PEG negative, which the curve reads as worst
            (Some(_), Some(growth)) if growth <= 0.0 => Some(-1.0),
            _ => None,
        };
        let revenue_growth = match (statement.revenue, statement.prior_revenue) {
            (Some(revenue), Some(prior)) => self.calculate_growth_pct(revenue, prior),
            _ => None,
        };
        let d2e = match (statement.total_liabilities, statement.shareholders_equity) {
            (Some(liabilities), Some(equity)) => self.calculate_debt_to_equity(liabilities, equity),
            _ => None,
        };
        let roe = match (statement.net_income, statement.shareholders_equity) {
            (Some(net_income), Some(equity)) => self.calculate_roe(net_income, equity),
            _ => None,
        };
        let margin = match (statement.net_income, statement.revenue) {
            (Some(net_income), Some(revenue)) => self.calculate_profit_margin(net_income, revenue),
            _ => None,
        };

        FundamentalMetrics::new(asset_id, period)
            .with(PE_RATIO, pe)
            .with(PEG_RATIO, peg)
            .with(DEBT_TO_EQUITY, d2e)
            .with(REVENUE_GROWTH_PCT, revenue_growth)
            .with(EARNINGS_GROWTH_PCT, earnings_growth)
            .with(RETURN_ON_EQUITY_PCT, roe)
            .with(PROFIT_MARGIN_PCT, margin)
    }

    fn analyze_sync(&self, metrics: &FundamentalMetrics) -> FundamentalScore {
        let mut contributions = BTreeMap::new();
        let mut missing = Vec::new();
        let mut weighted = Vec::new();

        for rule in &self.rules {
            match metrics.values.get(rule.name).copied().flatten() {
                Some(value) if value.is_finite() => {
                    let normalized = rule.normalize(value);
                    tracing::debug!(
                        "{}: {} = {:.3} -> {:+.3}",
                        metrics.asset_id,
                        rule.name,
                        value,
                        normalized
                    );
                    contributions.insert(rule.name.to_string(), normalized);
                    weighted.push((normalized, rule.weight));
                }
                Some(value) => {
                    tracing::warn!(
                        "{}: ignoring non-finite {} ({}), treated as missing",
                        metrics.asset_id,
                        rule.name,
                        value
                    );
                    missing.push(rule.name.to_string());
                }
                None => missing.push(rule.name.to_string()),
            }
        }

        for name in metrics.values.keys() {
            if !self.rules.iter().any(|r| r.name == name) {
                tracing::debug!("{}: ignoring unknown metric {}", metrics.asset_id, name);
            }
        }

        // Missing metrics leave both numerator and denominator
        let score = weighted_average(weighted).map(clamp_unit).unwrap_or(0.0);
        let confidence = contributions.len() as f64 / self.rules.len() as f64;

        if contributions.is_empty() {
            tracing::warn!("{}: no fundamental data available ({})", metrics.asset_id, metrics.period);
        } else {
            tracing::info!(
                "{}: fundamental score {:+.3} (confidence {:.2}, {} missing)",
                metrics.asset_id,
                score,
                confidence,
                missing.len()
            );
        }

        FundamentalScore {
            asset_id: metrics.asset_id.clone(),
            period: metrics.period.clone(),
            score,
            confidence,
            contributions,
            missing,
        }
    }
}

impl FundamentalAnalyzer for FundamentalAnalysisEngine {
    fn analyze(&self, metrics: &FundamentalMetrics) -> FundamentalScore {
        self.analyze_sync(metrics)
    }
}

impl Default for FundamentalAnalysisEngine {
    fn default() -> Self {
        Self::new()
    }
}
