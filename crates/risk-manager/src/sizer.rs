use analysis_core::{
    AlertLevel, AlertThresholds, AnalysisError, CompositeScore, Direction, RiskDecision,
};

use crate::models::{PriceCheck, RiskConfig};

/// Turns a composite signal and a volatility estimate into a bounded position
/// with stop, target and alert levels.
pub struct RiskSizer {
    config: RiskConfig,
}

impl RiskSizer {
    pub fn new(config: RiskConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Size against the configured account equity.
    pub fn size(&self, composite: CompositeScore, volatility: f64, entry_price: f64) -> Result<RiskDecision, AnalysisError> {
        self.size_with_equity(composite, volatility, entry_price, self.config.account_equity)
    }

    pub fn size_with_equity(
        &self,
        composite: CompositeScore,
        volatility: f64,
        entry_price: f64,
        account_equity: f64,
    ) -> Result<RiskDecision, AnalysisError> {
        let cfg = &self.config;

        if !volatility.is_finite() || volatility <= 0.0 {
            return Err(AnalysisError::invalid_risk(
                "volatility",
                format!("must be positive to derive a stop distance, got {}", volatility),
            ));
        }
        if !entry_price.is_finite() || entry_price <= 0.0 {
            return Err(AnalysisError::invalid_risk(
                "entry_price",
                format!("must be positive, got {}", entry_price),
            ));
        }
        if !account_equity.is_finite() || account_equity <= 0.0 {
            return Err(AnalysisError::invalid_risk(
                "account_equity",
                format!("must be positive, got {}", account_equity),
            ));
        }

        let direction = Direction::from_signal(composite.signal);
        let sign = direction.sign();
        let stop_distance = volatility * cfg.stop_multiple;
        let mut stop_loss = entry_price - sign * stop_distance;
        let stop_floored = stop_loss <= 0.0;
        if stop_floored {
            tracing::warn!(
                "{}: stop distance {:.4} exceeds entry {:.4}, long stop clamped to zero",
                composite.asset_id,
                stop_distance,
                entry_price
            );
            stop_loss = 0.0;
        }

        let risk_budget = account_equity * cfg.max_risk_per_trade;
        let conviction = cfg.conviction.get(composite.signal);
        let mut position_size = (risk_budget / stop_distance * conviction).max(0.0);
        // Division then multiplication can land one ulp over the budget
        while position_size > 0.0 && position_size * stop_distance > risk_budget {
            position_size = next_below(position_size);
        }

        let max_notional = account_equity * cfg.max_exposure_fraction;
        let mut capped_by_exposure = false;
        if position_size * entry_price > max_notional {
            position_size = max_notional / entry_price;
            capped_by_exposure = true;
            tracing::info!(
                "{}: position capped by exposure limit ({:.0}% of equity)",
                composite.asset_id,
                cfg.max_exposure_fraction * 100.0
            );
        }
        if cfg.whole_units {
            position_size = position_size.floor();
        }

        let take_profit = (entry_price + sign * stop_distance * cfg.reward_risk_ratio).max(0.0);
        let alerts = AlertThresholds {
            warning: (entry_price - sign * stop_distance * cfg.warning_fraction).max(0.0),
            critical: stop_loss,
        };

        tracing::info!(
            "{}: {:?} {:.4} units @ {:.4}, stop {:.4}, target {:.4} (conviction {:.2})",
            composite.asset_id,
            direction,
            position_size,
            entry_price,
            stop_loss,
            take_profit,
            conviction
        );

        Ok(RiskDecision {
            volatility,
            entry_price,
            account_equity,
            max_risk_per_trade: cfg.max_risk_per_trade,
            direction,
            conviction,
            position_size,
            position_value: position_size * entry_price,
            risk_budget,
            loss_at_stop: position_size * (entry_price - stop_loss).abs().min(stop_distance),
            stop_distance,
            stop_loss,
            take_profit,
            alerts,
            capped_by_exposure,
            stop_floored,
            composite,
        })
    }

    /// Classify a live price against a decision's alert thresholds.
    pub fn check_price(decision: &RiskDecision, current_price: f64) -> PriceCheck {
        let sign = decision.direction.sign();
        // Positive when the price has moved against the position
        let adverse = |level: f64| sign * (level - current_price) >= 0.0;

        let level = if adverse(decision.alerts.critical) {
            AlertLevel::Critical
        } else if adverse(decision.alerts.warning) {
            AlertLevel::Warning
        } else {
            AlertLevel::None
        };
        let take_profit_reached = sign * (current_price - decision.take_profit) >= 0.0;

        let unrealized_pnl = sign * (current_price - decision.entry_price) * decision.position_size;
        let unrealized_pnl_percent = sign * (current_price - decision.entry_price) / decision.entry_price * 100.0;

        if level != AlertLevel::None {
            tracing::warn!(
                "{}: price {:.4} crossed {:?} threshold",
                decision.composite.asset_id,
                current_price,
                level
            );
        }

        PriceCheck {
            current_price,
            level,
            should_exit: level == AlertLevel::Critical || take_profit_reached,
            take_profit_reached,
            unrealized_pnl,
            unrealized_pnl_percent,
        }
    }
}

/// Largest f64 strictly below a positive finite `value`.
fn next_below(value: f64) -> f64 {
    f64::from_bits(value.to_bits() - 1)
}

impl Default for RiskSizer {
    fn default() -> Self {
        Self {
            config: RiskConfig::default(),
        }
    }
}
