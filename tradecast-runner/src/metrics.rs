//! Outcome metrics — pure functions over a set of replay outcomes.
//!
//! Rates and averages are taken over executed trades only; a `NotExecuted`
//! outcome has no fills and contributes nothing but its count.

use serde::{Deserialize, Serialize};
use tradecast_core::domain::{TradeOutcome, TradeResult};

/// Aggregate statistics for one replay batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub total: usize,
    pub executed: usize,
    pub targets: usize,
    pub stop_losses: usize,
    pub timeouts: usize,
    pub not_executed: usize,
    /// Outcomes that carried an anomaly note.
    pub noted: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
    pub profit_factor: f64,
}

impl OutcomeSummary {
    pub fn compute(outcomes: &[TradeOutcome]) -> Self {
        let count = |r: TradeResult| outcomes.iter().filter(|o| o.result == r).count();
        let executed = executed_count(outcomes);
        let total_pnl = total_pnl(outcomes);
        Self {
            total: outcomes.len(),
            executed,
            targets: count(TradeResult::Target),
            stop_losses: count(TradeResult::StopLoss),
            timeouts: count(TradeResult::Timeout),
            not_executed: count(TradeResult::NotExecuted),
            noted: outcomes.iter().filter(|o| o.note.is_some()).count(),
            win_rate: win_rate(outcomes),
            total_pnl,
            avg_pnl: if executed == 0 {
                0.0
            } else {
                total_pnl / executed as f64
            },
            profit_factor: profit_factor(outcomes),
        }
    }
}

pub fn executed_count(outcomes: &[TradeOutcome]) -> usize {
    outcomes.iter().filter(|o| o.is_executed()).count()
}

/// Fraction of executed trades with positive pnl.
pub fn win_rate(outcomes: &[TradeOutcome]) -> f64 {
    let executed = executed_count(outcomes);
    if executed == 0 {
        return 0.0;
    }
    let winners = outcomes
        .iter()
        .filter(|o| o.is_executed() && o.pnl > 0.0)
        .count();
    winners as f64 / executed as f64
}

/// Sum of per-share pnl across executed trades.
pub fn total_pnl(outcomes: &[TradeOutcome]) -> f64 {
    outcomes
        .iter()
        .filter(|o| o.is_executed())
        .map(|o| o.pnl)
        .sum()
}

/// Gross profits / gross losses, capped at 100.0.
pub fn profit_factor(outcomes: &[TradeOutcome]) -> f64 {
    let gross_profit: f64 = outcomes.iter().filter(|o| o.pnl > 0.0).map(|o| o.pnl).sum();
    let gross_loss: f64 = outcomes
        .iter()
        .filter(|o| o.pnl < 0.0)
        .map(|o| o.pnl.abs())
        .sum();
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradecast_core::domain::TradeType;
    use tradecast_core::PipelineError;

    fn executed(result: TradeResult, pnl: f64) -> TradeOutcome {
        TradeOutcome {
            entry_price: Some(100.0),
            exit_price: Some(100.0 + pnl),
            result,
            pnl,
            ..TradeOutcome::not_executed("X.NS", TradeType::Long, None)
        }
    }

    #[test]
    fn empty_set_is_all_zero() {
        let s = OutcomeSummary::compute(&[]);
        assert_eq!(s.total, 0);
        assert_eq!(s.win_rate, 0.0);
        assert_eq!(s.avg_pnl, 0.0);
        assert_eq!(s.profit_factor, 0.0);
    }

    #[test]
    fn counts_and_rates() {
        let outcomes = vec![
            executed(TradeResult::Target, 4.0),
            executed(TradeResult::StopLoss, -2.0),
            executed(TradeResult::Timeout, 1.0),
            TradeOutcome::not_executed(
                "Y.NS",
                TradeType::Short,
                Some(PipelineError::data_unavailable("no bars")),
            ),
        ];
        let s = OutcomeSummary::compute(&outcomes);
        assert_eq!(s.total, 4);
        assert_eq!(s.executed, 3);
        assert_eq!((s.targets, s.stop_losses, s.timeouts, s.not_executed), (1, 1, 1, 1));
        assert_eq!(s.noted, 1);
        assert!((s.win_rate - 2.0 / 3.0).abs() < 1e-12);
        assert!((s.total_pnl - 3.0).abs() < 1e-12);
        assert!((s.avg_pnl - 1.0).abs() < 1e-12);
        assert!((s.profit_factor - 2.5).abs() < 1e-12);
    }

    #[test]
    fn all_winners_cap_profit_factor() {
        let outcomes = vec![executed(TradeResult::Target, 1.0)];
        assert_eq!(profit_factor(&outcomes), 100.0);
    }
}
