use analysis_core::{AlertLevel, AnalysisError, SignalStrength};
use serde::{Deserialize, Serialize};

/// Position-size multiplier per signal, each in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvictionTable {
    pub strong_buy: f64,
    pub buy: f64,
    pub hold: f64,
    pub sell: f64,
    pub strong_sell: f64,
}

impl Default for ConvictionTable {
    fn default() -> Self {
        Self {
            strong_buy: 1.0,
            buy: 0.5,
            hold: 0.0,
            sell: 0.5,
            strong_sell: 1.0,
        }
    }
}

impl ConvictionTable {
    pub fn get(&self, signal: SignalStrength) -> f64 {
        match signal {
            SignalStrength::StrongBuy => self.strong_buy,
            SignalStrength::Buy => self.buy,
            SignalStrength::Hold => self.hold,
            SignalStrength::Sell => self.sell,
            SignalStrength::StrongSell => self.strong_sell,
        }
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        for (name, value) in [
            ("conviction.strong_buy", self.strong_buy),
            ("conviction.buy", self.buy),
            ("conviction.hold", self.hold),
            ("conviction.sell", self.sell),
            ("conviction.strong_sell", self.strong_sell),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(AnalysisError::invalid_risk(
                    name,
                    format!("must be within [0, 1], got {}", value),
                ));
            }
        }
        Ok(())
    }
}

/// How the volatility estimate is derived from the price history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum VolatilityMethod {
    /// Wilder average true range, in price units
    Atr { period: usize },
    /// Sample standard deviation of simple returns, scaled by the last close
    ReturnsStdDev { lookback: usize },
}

impl Default for VolatilityMethod {
    fn default() -> Self {
        VolatilityMethod::Atr { period: 14 }
    }
}

impl VolatilityMethod {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        match *self {
            VolatilityMethod::Atr { period } if period == 0 => {
                Err(AnalysisError::invalid_risk("volatility.period", "must be at least 1"))
            }
            VolatilityMethod::ReturnsStdDev { lookback } if lookback < 2 => {
                Err(AnalysisError::invalid_risk("volatility.lookback", "must be at least 2"))
            }
            _ => Ok(()),
        }
    }

    /// Closes needed for one estimate
    pub fn min_bars(&self) -> usize {
        match *self {
            VolatilityMethod::Atr { period } => period + 1,
            VolatilityMethod::ReturnsStdDev { lookback } => lookback + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub account_equity: f64,
    /// Fraction of equity lost if the stop is hit, in (0, 1]
    pub max_risk_per_trade: f64,
    /// Stop distance as a multiple of the volatility estimate
    pub stop_multiple: f64,
    /// Ceiling on position notional as a fraction of equity
    pub max_exposure_fraction: f64,
    /// Warning alert sits at this fraction of the way from entry to stop
    pub warning_fraction: f64,
    pub reward_risk_ratio: f64,
    /// Floor position sizes to whole units
    pub whole_units: bool,
    pub conviction: ConvictionTable,
    pub volatility: VolatilityMethod,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            account_equity: 100_000.0,
            max_risk_per_trade: 0.01,
            stop_multiple: 2.0,
            max_exposure_fraction: 1.0,
            warning_fraction: 0.5,
            reward_risk_ratio: 2.0,
            whole_units: false,
            conviction: ConvictionTable::default(),
            volatility: VolatilityMethod::default(),
        }
    }
}

impl RiskConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !self.account_equity.is_finite() || self.account_equity <= 0.0 {
            return Err(AnalysisError::invalid_risk(
                "account_equity",
                format!("must be positive, got {}", self.account_equity),
            ));
        }
        if !self.max_risk_per_trade.is_finite() || self.max_risk_per_trade <= 0.0 || self.max_risk_per_trade > 1.0 {
            return Err(AnalysisError::invalid_risk(
                "max_risk_per_trade",
                format!("must be within (0, 1], got {}", self.max_risk_per_trade),
            ));
        }
        if !self.stop_multiple.is_finite() || self.stop_multiple <= 0.0 {
            return Err(AnalysisError::invalid_risk(
                "stop_multiple",
                format!("must be positive, got {}", self.stop_multiple),
            ));
        }
        if !self.max_exposure_fraction.is_finite() || self.max_exposure_fraction < 0.0 {
            return Err(AnalysisError::invalid_risk(
                "max_exposure_fraction",
                format!("must be non-negative, got {}", self.max_exposure_fraction),
            ));
        }
        if !self.warning_fraction.is_finite() || self.warning_fraction <= 0.0 || self.warning_fraction >= 1.0 {
            return Err(AnalysisError::invalid_risk(
                "warning_fraction",
                format!("must be within (0, 1), got {}", self.warning_fraction),
            ));
        }
        if !self.reward_risk_ratio.is_finite() || self.reward_risk_ratio <= 0.0 {
            return Err(AnalysisError::invalid_risk(
                "reward_risk_ratio",
                format!("must be positive, got {}", self.reward_risk_ratio),
            ));
        }
        self.conviction.validate()?;
        self.volatility.validate()
    }
}

/// A live price checked against a decision's stop and alert levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceCheck {
    pub current_price: f64,
    pub level: AlertLevel,
    pub should_exit: bool,
    pub take_profit_reached: bool,
    pub unrealized_pnl: f64,
    pub unrealized_pnl_percent: f64,
}
