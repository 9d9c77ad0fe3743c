//! Backtest simulator — replays one priced signal over a close series.
//!
//! A single forward pass through three phases:
//!
//! 1. **Awaiting entry.** Only the first `entry_window_bars` bars are eligible.
//!    The first close inside `current_price ± entry_tolerance_pct%` fills the
//!    entry at that close. No eligible bar → `NotExecuted`.
//! 2. **In trade.** From the entry bar onward, each close is checked against
//!    the target first and the stop second. Target wins a tie.
//! 3. **Timeout.** Neither level touched: exit at the bar `TIMEOUT_EXIT_OFFSET`
//!    positions from the end of the post-entry series, staying clear of the
//!    closing minutes. A post-entry series shorter than the offset exits at its
//!    last bar and carries a `SequenceTooShort` note.
//!
//! The simulator is a pure function and never fails; missing data and missed
//! entries are expressed in the returned `TradeOutcome`.

use serde::{Deserialize, Serialize};

use crate::domain::{PriceBar, TradeOutcome, TradeResult, TradeSignal, TradeType};
use crate::error::PipelineError;

/// Timeout exits use the bar this many positions from the end.
pub const TIMEOUT_EXIT_OFFSET: usize = 15;

/// Entry rules for a replay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplayParams {
    /// Number of leading bars in which an entry may fill.
    pub entry_window_bars: usize,
    /// Allowed deviation (percent) of the fill from the signal's current price.
    pub entry_tolerance_pct: f64,
}

impl Default for ReplayParams {
    fn default() -> Self {
        Self {
            entry_window_bars: 5,
            entry_tolerance_pct: 0.2,
        }
    }
}

impl ReplayParams {
    /// Inclusive `(lower, upper)` fill band around `reference`.
    pub fn entry_band(&self, reference: f64) -> (f64, f64) {
        let tolerance = self.entry_tolerance_pct / 100.0;
        (reference * (1.0 - tolerance), reference * (1.0 + tolerance))
    }
}

#[derive(Debug, Clone, Copy)]
struct Fill {
    index: usize,
    price: f64,
}

/// Replay `signal` over `bars`.
///
/// `bars` are expected in strictly increasing time order; providers return
/// them that way and `normalize_bars` restores it for any other source. An
/// unordered slice is still walked in slice order and never panics.
pub fn simulate(signal: &TradeSignal, bars: &[PriceBar], params: &ReplayParams) -> TradeOutcome {
    if bars.is_empty() {
        return TradeOutcome::not_executed(
            &signal.asset_id,
            signal.trade_type,
            Some(PipelineError::data_unavailable("empty price series")),
        );
    }

    let Some(entry) = find_entry(bars, signal.current_price, params) else {
        return TradeOutcome::not_executed(&signal.asset_id, signal.trade_type, None);
    };

    let in_trade = &bars[entry.index..];
    let (exit, result, note) = match find_exit(in_trade, signal) {
        Some((offset, price, result)) => (
            Fill {
                index: entry.index + offset,
                price,
            },
            result,
            None,
        ),
        None => {
            let (offset, note) = timeout_offset(in_trade.len());
            (
                Fill {
                    index: entry.index + offset,
                    price: in_trade[offset].close,
                },
                TradeResult::Timeout,
                note,
            )
        }
    };

    TradeOutcome {
        asset_id: signal.asset_id.clone(),
        trade_type: signal.trade_type,
        entry_price: Some(entry.price),
        entry_time: Some(bars[entry.index].timestamp),
        exit_price: Some(exit.price),
        exit_time: Some(bars[exit.index].timestamp),
        result,
        pnl: signal.trade_type.pnl(entry.price, exit.price),
        note,
    }
}

fn find_entry(bars: &[PriceBar], reference: f64, params: &ReplayParams) -> Option<Fill> {
    let (lower, upper) = params.entry_band(reference);
    bars.iter()
        .take(params.entry_window_bars)
        .position(|bar| lower <= bar.close && bar.close <= upper)
        .map(|index| Fill {
            index,
            price: bars[index].close,
        })
}

/// First bar touching target or stop; exits fill at the level, not the close.
fn find_exit(in_trade: &[PriceBar], signal: &TradeSignal) -> Option<(usize, f64, TradeResult)> {
    let target = signal.target_price;
    let stop = signal.stop_loss_price;
    in_trade.iter().enumerate().find_map(|(i, bar)| {
        let (hit_target, hit_stop) = match signal.trade_type {
            TradeType::Long => (bar.close >= target, bar.close <= stop),
            TradeType::Short => (bar.close <= target, bar.close >= stop),
        };
        if hit_target {
            Some((i, target, TradeResult::Target))
        } else if hit_stop {
            Some((i, stop, TradeResult::StopLoss))
        } else {
            None
        }
    })
}

/// Position of the timeout exit bar inside a non-empty post-entry series.
fn timeout_offset(len: usize) -> (usize, Option<PipelineError>) {
    match len.checked_sub(TIMEOUT_EXIT_OFFSET) {
        Some(offset) => (offset, None),
        None => (
            len - 1,
            Some(PipelineError::SequenceTooShort {
                bars: len,
                required: TIMEOUT_EXIT_OFFSET,
            }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{is_chronological, Confidence};
    use chrono::{Duration, TimeZone, Utc};

    fn bars(closes: &[f64]) -> Vec<PriceBar> {
        let open = Utc.with_ymd_and_hms(2024, 1, 2, 3, 45, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar::new(open + Duration::minutes(i as i64), c))
            .collect()
    }

    fn signal(trade_type: TradeType, current: f64, target: f64, stop: f64) -> TradeSignal {
        TradeSignal {
            asset_id: "SBIN.NS".into(),
            trade_type,
            probability: 0.6,
            predicted_change_pct: 2.0,
            predicted_variance: None,
            confidence: Confidence::High,
            current_price: current,
            target_price: target,
            stop_loss_price: stop,
            model_aic: None,
        }
    }

    #[test]
    fn entry_band_is_inclusive() {
        let params = ReplayParams::default();
        let (lower, upper) = params.entry_band(100.0);
        assert!((lower - 99.8).abs() < 1e-9);
        assert!((upper - 100.2).abs() < 1e-9);
    }

    #[test]
    fn entry_outside_window_is_ignored() {
        let sig = signal(TradeType::Long, 100.0, 105.0, 98.0);
        let series = bars(&[101.0, 101.0, 101.0, 101.0, 101.0, 100.0, 106.0]);
        let outcome = simulate(&sig, &series, &ReplayParams::default());
        assert_eq!(outcome.result, TradeResult::NotExecuted);
        assert!(outcome.note.is_none());
    }

    #[test]
    fn long_stop_loss() {
        let sig = signal(TradeType::Long, 100.0, 105.0, 98.0);
        let outcome = simulate(&sig, &bars(&[100.0, 99.0, 97.5]), &ReplayParams::default());
        assert_eq!(outcome.result, TradeResult::StopLoss);
        assert_eq!(outcome.exit_price, Some(98.0));
        assert!((outcome.pnl + 2.0).abs() < 1e-9);
    }

    #[test]
    fn short_target_and_stop_are_mirrored() {
        let sig = signal(TradeType::Short, 100.0, 95.0, 102.0);
        let target = simulate(&sig, &bars(&[100.1, 97.0, 94.0]), &ReplayParams::default());
        assert_eq!(target.result, TradeResult::Target);
        assert!((target.pnl - 5.1).abs() < 1e-9);

        let stop = simulate(&sig, &bars(&[100.1, 101.0, 102.5]), &ReplayParams::default());
        assert_eq!(stop.result, TradeResult::StopLoss);
        assert!((stop.pnl + 1.9).abs() < 1e-9);
    }

    #[test]
    fn target_wins_when_one_bar_satisfies_both() {
        // Degenerate levels: target below stop for a long, so a close of 100
        // satisfies both conditions at once.
        let sig = signal(TradeType::Long, 100.0, 99.0, 101.0);
        let outcome = simulate(&sig, &bars(&[100.0]), &ReplayParams::default());
        assert_eq!(outcome.result, TradeResult::Target);
        assert_eq!(outcome.exit_price, Some(99.0));
    }

    #[test]
    fn timeout_exits_fifteen_bars_from_end() {
        let sig = signal(TradeType::Long, 100.0, 150.0, 50.0);
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64 * 0.1).collect();
        let series = bars(&closes);
        let outcome = simulate(&sig, &series, &ReplayParams::default());
        assert_eq!(outcome.result, TradeResult::Timeout);
        assert_eq!(outcome.exit_time, Some(series[15].timestamp));
        assert!((outcome.exit_price.unwrap() - 101.5).abs() < 1e-9);
        assert!(outcome.note.is_none());
    }

    #[test]
    fn short_timeout_sequence_is_guarded() {
        let sig = signal(TradeType::Long, 100.0, 150.0, 50.0);
        let series = bars(&[100.0, 100.5, 101.0]);
        let outcome = simulate(&sig, &series, &ReplayParams::default());
        assert_eq!(outcome.result, TradeResult::Timeout);
        assert_eq!(outcome.exit_price, Some(101.0));
        assert_eq!(
            outcome.note,
            Some(PipelineError::SequenceTooShort {
                bars: 3,
                required: TIMEOUT_EXIT_OFFSET
            })
        );
    }

    #[test]
    fn zero_window_never_enters() {
        let sig = signal(TradeType::Long, 100.0, 105.0, 98.0);
        let params = ReplayParams {
            entry_window_bars: 0,
            entry_tolerance_pct: 0.2,
        };
        let outcome = simulate(&sig, &bars(&[100.0, 106.0]), &params);
        assert_eq!(outcome.result, TradeResult::NotExecuted);
    }

    #[test]
    fn unordered_bars_are_walked_in_slice_order() {
        let sig = signal(TradeType::Long, 100.0, 102.0, 99.0);
        // Timestamps run backwards; closes in slice order are 100, 102.5, 101.
        let mut series = bars(&[101.0, 102.5, 100.0]);
        series.reverse();
        assert!(!is_chronological(&series));

        let outcome = simulate(&sig, &series, &ReplayParams::default());
        assert_eq!(outcome.entry_price, Some(100.0));
        assert_eq!(outcome.result, TradeResult::Target);
    }
}
