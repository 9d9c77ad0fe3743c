//! Replay batch — fetch intraday bars per signal and simulate.
//!
//! Fetching is the slow part, so replays share the bounded pool with the
//! signal batch. The simulator itself stays a pure function of its inputs.
//! A fetch failure becomes a `NotExecuted` outcome carrying a
//! `DataUnavailable` note; it never aborts the batch.

use rayon::prelude::*;
use tracing::{debug, info, warn};
use tradecast_core::domain::{TradeOutcome, TradeSignal};
use tradecast_core::market::{normalize_bars, BarQuery, MarketData};
use tradecast_core::simulator::{simulate, ReplayParams};
use tradecast_core::PipelineError;

use crate::orchestrator::{build_pool, BatchError, DEFAULT_MAX_CONCURRENCY};

/// Replays signals against one market data source.
pub struct BacktestRunner<'a> {
    market: &'a dyn MarketData,
    query: BarQuery,
    params: ReplayParams,
    max_concurrency: usize,
}

impl<'a> BacktestRunner<'a> {
    pub fn new(market: &'a dyn MarketData, query: BarQuery, params: ReplayParams) -> Self {
        Self {
            market,
            query,
            params,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn params(&self) -> &ReplayParams {
        &self.params
    }

    /// Fetch and replay one signal.
    pub fn replay_one(&self, signal: &TradeSignal) -> TradeOutcome {
        match self.market.bars(&signal.asset_id, &self.query) {
            Ok(bars) => simulate(signal, &normalize_bars(bars), &self.params),
            Err(e) => {
                warn!(asset = %signal.asset_id, error = %e, "replay data unavailable");
                TradeOutcome::not_executed(
                    &signal.asset_id,
                    signal.trade_type,
                    Some(PipelineError::data_unavailable(e.to_string())),
                )
            }
        }
    }

    /// Replay every signal, outcomes in input order.
    pub fn run(&self, signals: &[TradeSignal]) -> Result<Vec<TradeOutcome>, BatchError> {
        if signals.is_empty() {
            return Err(BatchError::NoAssets);
        }
        let pool = build_pool(self.max_concurrency)?;
        let total = signals.len();
        info!(
            signals = total,
            workers = self.max_concurrency,
            market = self.market.name(),
            interval = %self.query.interval,
            range = %self.query.range,
            "starting replay batch"
        );

        let outcomes: Vec<TradeOutcome> = pool.install(|| {
            signals
                .par_iter()
                .enumerate()
                .map(|(i, signal)| {
                    let outcome = self.replay_one(signal);
                    debug!(
                        "{}/{total} {}: {} pnl={:.2}",
                        i + 1,
                        outcome.asset_id,
                        outcome.result.as_str(),
                        outcome.pnl
                    );
                    outcome
                })
                .collect()
        });

        let executed = outcomes.iter().filter(|o| o.is_executed()).count();
        info!(executed, total, "replay batch finished");
        Ok(outcomes)
    }
}
