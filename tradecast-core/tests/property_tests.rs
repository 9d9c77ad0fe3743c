//! Property tests for signal aggregation and replay invariants.
//!
//! Uses proptest to verify:
//! 1. Direction: Long iff probability > 0.5
//! 2. Price ordering: target/current/stop ordered by direction
//! 3. Confidence monotonicity: tier never drops as qlike improves or the
//!    probability moves away from one half
//! 4. Replay purity: identical inputs give identical outcomes
//! 5. Missed entry: no close in band ⇒ NotExecuted with zero pnl

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use tradecast_core::domain::{
    Confidence, PredictionResponse, PriceBar, SignalOutcome, TradeResult, TradeSignal, TradeType,
};
use tradecast_core::signal::{confidence_tier, SignalAggregator};
use tradecast_core::simulator::{simulate, ReplayParams};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (10.0..5000.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_change() -> impl Strategy<Value = f64> {
    1.5..20.0_f64
}

fn arb_risk_ratio() -> impl Strategy<Value = f64> {
    0.05..3.0_f64
}

fn arb_closes() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(90.0..110.0_f64, 0..80)
}

fn to_bars(closes: &[f64]) -> Vec<PriceBar> {
    let open = Utc.with_ymd_and_hms(2024, 1, 2, 3, 45, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| PriceBar::new(open + Duration::minutes(i as i64), c))
        .collect()
}

fn response(probability: f64, change: f64, qlike: Option<f64>) -> PredictionResponse {
    PredictionResponse {
        asset_id: "PROP".into(),
        direction_probability: probability,
        predicted_change_pct: Some(change),
        predicted_variance: None,
        model_aic: None,
        qlike_score: qlike,
        last_observed_date: None,
    }
}

fn signal(trade_type: TradeType, target: f64, stop: f64) -> TradeSignal {
    TradeSignal {
        asset_id: "PROP".into(),
        trade_type,
        probability: 0.6,
        predicted_change_pct: 2.0,
        predicted_variance: None,
        confidence: Confidence::Medium,
        current_price: 100.0,
        target_price: target,
        stop_loss_price: stop,
        model_aic: None,
    }
}

proptest! {
    #[test]
    fn direction_follows_probability(
        p in 0.0001..=1.0_f64,
        change in arb_change(),
        price in arb_price(),
    ) {
        let outcome = SignalAggregator::new(1.0)
            .aggregate_with(&response(p, change, None), |_| Ok(price));
        let SignalOutcome::Full(s) = outcome else {
            return Err(TestCaseError::fail("expected full signal"));
        };
        prop_assert_eq!(s.trade_type == TradeType::Long, p > 0.5);
    }

    #[test]
    fn populated_prices_are_ordered(
        p in 0.0..=1.0_f64,
        change in arb_change(),
        risk in arb_risk_ratio(),
        price in arb_price(),
    ) {
        let outcome = SignalAggregator::new(risk)
            .aggregate_with(&response(p, change, Some(1.0)), |_| Ok(price));
        let SignalOutcome::Full(s) = outcome else {
            return Err(TestCaseError::fail("expected full signal"));
        };
        prop_assert!(s.prices_ordered(), "{:?}", s);
    }

    #[test]
    fn confidence_monotone_in_extremity(
        p in 0.0..=1.0_f64,
        nudge in 0.0..0.2_f64,
        qlike in 0.0..3.0_f64,
    ) {
        // Push p further from one half by `nudge`.
        let further = if p > 0.5 { (p + nudge).min(1.0) } else { (p - nudge).max(0.0) };
        prop_assert!(confidence_tier(further, Some(qlike)) >= confidence_tier(p, Some(qlike)));
    }

    #[test]
    fn confidence_monotone_in_qlike(p in 0.0..=1.0_f64, qlike in 0.0..3.0_f64, drop in 0.0..3.0_f64) {
        let better = (qlike - drop).max(0.0);
        prop_assert!(confidence_tier(p, Some(better)) >= confidence_tier(p, Some(qlike)));
        prop_assert!(confidence_tier(p, Some(qlike)) >= confidence_tier(p, None));
    }

    #[test]
    fn replay_is_pure(closes in arb_closes(), long in any::<bool>(), window in 0usize..10) {
        let bars = to_bars(&closes);
        let sig = if long {
            signal(TradeType::Long, 104.0, 97.0)
        } else {
            signal(TradeType::Short, 96.0, 103.0)
        };
        let params = ReplayParams { entry_window_bars: window, entry_tolerance_pct: 0.5 };
        let a = simulate(&sig, &bars, &params);
        let b = simulate(&sig, &bars, &params);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn missed_entry_is_not_executed(closes in prop::collection::vec(101.0..110.0_f64, 0..40)) {
        // Every close sits above the 0.2% band around 100.
        let bars = to_bars(&closes);
        let outcome = simulate(&signal(TradeType::Long, 104.0, 97.0), &bars, &ReplayParams::default());
        prop_assert_eq!(outcome.result, TradeResult::NotExecuted);
        prop_assert_eq!(outcome.pnl, 0.0);
        prop_assert!(outcome.entry_price.is_none());
    }

    #[test]
    fn executed_pnl_matches_fills(closes in arb_closes()) {
        let bars = to_bars(&closes);
        let params = ReplayParams { entry_window_bars: 10, entry_tolerance_pct: 2.0 };
        let outcome = simulate(&signal(TradeType::Short, 96.0, 103.0), &bars, &params);
        if let (Some(entry), Some(exit)) = (outcome.entry_price, outcome.exit_price) {
            prop_assert!((outcome.pnl - (entry - exit)).abs() < 1e-12);
        } else {
            prop_assert_eq!(outcome.result, TradeResult::NotExecuted);
        }
    }
}
