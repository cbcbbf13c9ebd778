#[cfg(test)]
mod risk_sizer_tests {
    use crate::models::{ConvictionTable, RiskConfig, VolatilityMethod};
    use crate::sizer::RiskSizer;
    use crate::volatility::estimate_volatility;
    use analysis_core::{
        AlertLevel, AnalysisError, CompositeScore, Direction, PillarScore, PillarWeights, PricePoint,
        SignalStrength,
    };
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};

    fn composite(signal: SignalStrength, score: f64) -> CompositeScore {
        CompositeScore {
            asset_id: "ACME".to_string(),
            as_of: Utc.with_ymd_and_hms(2024, 6, 3, 16, 0, 0).unwrap(),
            technical: PillarScore::new(score, 1.0),
            fundamental: PillarScore::excluded(),
            sentiment: PillarScore::excluded(),
            effective_weights: PillarWeights {
                technical: 1.0,
                fundamental: 0.0,
                sentiment: 0.0,
            },
            score,
            signal,
            recommendation: signal.to_label().to_string(),
        }
    }

    fn sizer() -> RiskSizer {
        RiskSizer::new(RiskConfig::default()).unwrap()
    }

    #[test]
    fn test_strong_buy_example() {
        // risk 1% of 100k, stop distance 2.0 (vol 1.0 x 2), entry 50
        let decision = sizer()
            .size(composite(SignalStrength::StrongBuy, 0.8), 1.0, 50.0)
            .unwrap();

        assert_relative_eq!(decision.position_size, 500.0, epsilon = 1e-9);
        assert_relative_eq!(decision.stop_loss, 48.0, epsilon = 1e-9);
        assert_relative_eq!(decision.stop_distance, 2.0, epsilon = 1e-9);
        assert_relative_eq!(decision.take_profit, 54.0, epsilon = 1e-9);
        assert_relative_eq!(decision.alerts.warning, 49.0, epsilon = 1e-9);
        assert_relative_eq!(decision.alerts.critical, 48.0, epsilon = 1e-9);
        assert_relative_eq!(decision.loss_at_stop, 1000.0, epsilon = 1e-9);
        assert_relative_eq!(decision.position_value, 25_000.0, epsilon = 1e-9);
        assert_eq!(decision.direction, Direction::Long);
        assert!(!decision.capped_by_exposure);
    }

    #[test]
    fn test_loss_at_stop_within_budget() {
        let s = sizer();
        for signal in SignalStrength::ALL {
            let decision = s.size(composite(signal, 0.0), 1.7, 83.0).unwrap();
            assert!(decision.position_size >= 0.0);
            assert!(decision.loss_at_stop <= decision.risk_budget);
        }
    }

    #[test]
    fn test_hold_sizes_to_zero() {
        let decision = sizer().size(composite(SignalStrength::Hold, 0.0), 1.0, 50.0).unwrap();
        assert_eq!(decision.position_size, 0.0);
        assert_eq!(decision.conviction, 0.0);
        assert_eq!(decision.direction, Direction::Long);
    }

    #[test]
    fn test_sell_mirrors_levels() {
        let decision = sizer()
            .size(composite(SignalStrength::StrongSell, -0.9), 1.0, 50.0)
            .unwrap();
        assert_eq!(decision.direction, Direction::Short);
        assert_relative_eq!(decision.stop_loss, 52.0, epsilon = 1e-9);
        assert_relative_eq!(decision.take_profit, 46.0, epsilon = 1e-9);
        assert_relative_eq!(decision.alerts.warning, 51.0, epsilon = 1e-9);
        assert_relative_eq!(decision.position_size, 500.0, epsilon = 1e-9);

        let half = sizer().size(composite(SignalStrength::Sell, -0.3), 1.0, 50.0).unwrap();
        assert_relative_eq!(half.position_size, 250.0, epsilon = 1e-9);
    }

    #[test]
    fn test_doubling_volatility_halves_size() {
        let s = sizer();
        let a = s.size(composite(SignalStrength::Buy, 0.4), 1.5, 40.0).unwrap();
        let b = s.size(composite(SignalStrength::Buy, 0.4), 3.0, 40.0).unwrap();
        assert_relative_eq!(b.position_size * 2.0, a.position_size, epsilon = 1e-9);
    }

    #[test]
    fn test_exposure_cap() {
        let config = RiskConfig {
            max_exposure_fraction: 0.1,
            ..RiskConfig::default()
        };
        let decision = RiskSizer::new(config)
            .unwrap()
            .size(composite(SignalStrength::StrongBuy, 0.9), 0.1, 50.0)
            .unwrap();
        // Uncapped would be 1000 / 0.2 = 5000 units = 250k notional
        assert!(decision.capped_by_exposure);
        assert_relative_eq!(decision.position_value, 10_000.0, epsilon = 1e-6);
        assert_relative_eq!(decision.position_size, 200.0, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_exposure_cap_means_no_position() {
        let config = RiskConfig {
            max_exposure_fraction: 0.0,
            ..RiskConfig::default()
        };
        let decision = RiskSizer::new(config)
            .unwrap()
            .size(composite(SignalStrength::StrongBuy, 0.9), 1.0, 50.0)
            .unwrap();
        assert_eq!(decision.position_size, 0.0);
        assert!(decision.capped_by_exposure);
    }

    #[test]
    fn test_whole_units_floor() {
        let config = RiskConfig {
            whole_units: true,
            ..RiskConfig::default()
        };
        let decision = RiskSizer::new(config)
            .unwrap()
            .size(composite(SignalStrength::StrongBuy, 0.9), 1.5, 50.0)
            .unwrap();
        // 1000 / 3.0 = 333.33
        assert_eq!(decision.position_size, 333.0);
    }

    #[test]
    fn test_invalid_parameters() {
        let cases = [
            (RiskConfig { max_risk_per_trade: 0.0, ..RiskConfig::default() }, "max_risk_per_trade"),
            (RiskConfig { max_risk_per_trade: 1.5, ..RiskConfig::default() }, "max_risk_per_trade"),
            (RiskConfig { stop_multiple: 0.0, ..RiskConfig::default() }, "stop_multiple"),
            (RiskConfig { max_exposure_fraction: -1.0, ..RiskConfig::default() }, "max_exposure_fraction"),
            (RiskConfig { warning_fraction: 1.0, ..RiskConfig::default() }, "warning_fraction"),
            (RiskConfig { reward_risk_ratio: 0.0, ..RiskConfig::default() }, "reward_risk_ratio"),
            (RiskConfig { account_equity: 0.0, ..RiskConfig::default() }, "account_equity"),
            (
                RiskConfig {
                    conviction: ConvictionTable { buy: 1.2, ..ConvictionTable::default() },
                    ..RiskConfig::default()
                },
                "conviction.buy",
            ),
        ];

        for (config, parameter) in cases {
            match RiskSizer::new(config) {
                Err(AnalysisError::InvalidRiskParameters { parameter: p, .. }) => assert_eq!(p, parameter),
                other => panic!("expected invalid {}, got {:?}", parameter, other.err()),
            }
        }
    }

    #[test]
    fn test_non_positive_volatility_rejected() {
        let s = sizer();
        for vol in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = s.size(composite(SignalStrength::Buy, 0.3), vol, 50.0).unwrap_err();
            assert_eq!(err.subject(), "risk.volatility");
        }
    }

    #[test]
    fn test_loss_at_stop_never_exceeds_budget_across_volatilities() {
        let s = sizer();
        for i in 0..20_000 {
            let vol = 0.0107 + i as f64 * 1e-6;
            let decision = s.size(composite(SignalStrength::StrongBuy, 0.9), vol, 1000.0).unwrap();
            assert!(
                decision.loss_at_stop <= decision.risk_budget,
                "vol {}: {} > {}",
                vol,
                decision.loss_at_stop,
                decision.risk_budget
            );
            assert!(decision.position_size * decision.stop_distance <= decision.risk_budget);
        }
    }

    #[test]
    fn test_hold_with_stop_past_zero_sizes_to_zero() {
        // stop distance 6.0 on a 5.0 entry
        let decision = sizer().size(composite(SignalStrength::Hold, 0.0), 3.0, 5.0).unwrap();
        assert_eq!(decision.position_size, 0.0);
        assert_eq!(decision.loss_at_stop, 0.0);
        assert_eq!(decision.stop_loss, 0.0);
        assert!(decision.stop_floored);
        assert_relative_eq!(decision.alerts.warning, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_long_stop_clamped_to_zero() {
        let decision = sizer()
            .size(composite(SignalStrength::Buy, 0.3), 30.0, 50.0)
            .unwrap();
        assert!(decision.stop_floored);
        assert_eq!(decision.stop_loss, 0.0);
        assert_eq!(decision.alerts.critical, 0.0);
        assert_eq!(decision.alerts.warning, 20.0);
        // 1000 / 60 x 0.5, sized on the full stop distance
        assert_relative_eq!(decision.position_size, 1000.0 / 60.0 * 0.5, epsilon = 1e-9);
        // The clamped stop caps the loss at the entry price
        assert_relative_eq!(decision.loss_at_stop, decision.position_size * 50.0, epsilon = 1e-9);
        assert!(decision.loss_at_stop <= decision.risk_budget);
    }

    #[test]
    fn test_normal_stop_not_flagged() {
        let decision = sizer()
            .size(composite(SignalStrength::StrongBuy, 0.8), 1.0, 50.0)
            .unwrap();
        assert!(!decision.stop_floored);
    }

    #[test]
    fn test_price_checks_long() {
        let decision = sizer()
            .size(composite(SignalStrength::StrongBuy, 0.8), 1.0, 50.0)
            .unwrap();

        let check = RiskSizer::check_price(&decision, 50.5);
        assert_eq!(check.level, AlertLevel::None);
        assert!(!check.should_exit);

        let check = RiskSizer::check_price(&decision, 48.9);
        assert_eq!(check.level, AlertLevel::Warning);
        assert!(!check.should_exit);

        let check = RiskSizer::check_price(&decision, 47.5);
        assert_eq!(check.level, AlertLevel::Critical);
        assert!(check.should_exit);
        assert_relative_eq!(check.unrealized_pnl, -1250.0, epsilon = 1e-9);
        assert_relative_eq!(check.unrealized_pnl_percent, -5.0, epsilon = 1e-9);

        let check = RiskSizer::check_price(&decision, 54.0);
        assert!(check.take_profit_reached);
        assert!(check.should_exit);
    }

    #[test]
    fn test_price_checks_short() {
        let decision = sizer()
            .size(composite(SignalStrength::StrongSell, -0.8), 1.0, 50.0)
            .unwrap();
        assert_eq!(RiskSizer::check_price(&decision, 49.0).level, AlertLevel::None);
        assert_eq!(RiskSizer::check_price(&decision, 51.2).level, AlertLevel::Warning);
        assert_eq!(RiskSizer::check_price(&decision, 52.0).level, AlertLevel::Critical);
        assert!(RiskSizer::check_price(&decision, 45.0).take_profit_reached);
    }

    fn bars(n: usize) -> Vec<PricePoint> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                PricePoint {
                    timestamp: start + Duration::days(i as i64),
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 1_000_000.0,
                }
            })
            .collect()
    }

    #[test]
    fn test_atr_volatility() {
        let vol = estimate_volatility(&bars(30), VolatilityMethod::default()).unwrap();
        // Each bar spans 2.0 and the close-to-high gap is never larger
        assert_relative_eq!(vol, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_returns_volatility_scales_with_price() {
        let vol = estimate_volatility(&bars(30), VolatilityMethod::ReturnsStdDev { lookback: 20 }).unwrap();
        assert!(vol > 0.0);
        assert!(vol < 1.0);
    }

    #[test]
    fn test_volatility_needs_history() {
        let err = estimate_volatility(&bars(10), VolatilityMethod::default()).unwrap_err();
        match err {
            AnalysisError::InsufficientData { required, available, .. } => {
                assert_eq!(required, 15);
                assert_eq!(available, 10);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }
}
