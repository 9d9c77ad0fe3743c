//! Batch orchestrator — fans a signal pipeline out over many assets.
//!
//! Each asset runs fetch → aggregate independently on a bounded rayon pool.
//! A failure in one asset is captured as `SignalOutcome::Failed` and never
//! stops the batch. Results come back in input order: the indexed parallel
//! collect places each outcome at its asset's position, so no completion-order
//! bookkeeping is shared between workers.

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};
use tradecast_core::domain::{AssetFailure, SignalOutcome, TradeSignal};
use tradecast_core::market::MarketData;
use tradecast_core::prediction::PredictionService;
use tradecast_core::signal::SignalAggregator;
use tradecast_core::PipelineError;

/// Default worker count for signal and replay batches.
pub const DEFAULT_MAX_CONCURRENCY: usize = 20;

/// Operation-level failures. Per-asset failures never surface here.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("no assets supplied")]
    NoAssets,

    #[error("max_concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("failed to build worker pool: {0}")]
    Pool(String),
}

/// Build the bounded worker pool shared by signal and replay batches.
pub(crate) fn build_pool(max_concurrency: usize) -> Result<rayon::ThreadPool, BatchError> {
    if max_concurrency == 0 {
        return Err(BatchError::ZeroConcurrency);
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(max_concurrency)
        .thread_name(|i| format!("tradecast-worker-{i}"))
        .build()
        .map_err(|e| BatchError::Pool(e.to_string()))
}

/// Counts by outcome kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchTally {
    pub full: usize,
    pub partial: usize,
    pub failed: usize,
}

/// All outcomes of one batch, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub outcomes: Vec<SignalOutcome>,
}

impl BatchReport {
    /// Full and partial signals, input order preserved.
    pub fn successful(&self) -> Vec<&SignalOutcome> {
        self.outcomes.iter().filter(|o| !o.is_failure()).collect()
    }

    /// Fully priced signals only.
    pub fn full_signals(&self) -> Vec<&TradeSignal> {
        self.outcomes.iter().filter_map(SignalOutcome::full).collect()
    }

    pub fn failures(&self) -> Vec<&AssetFailure> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                SignalOutcome::Failed(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    pub fn tally(&self) -> BatchTally {
        self.outcomes
            .iter()
            .fold(BatchTally::default(), |mut t, outcome| {
                match outcome {
                    SignalOutcome::Full(_) => t.full += 1,
                    SignalOutcome::Partial(_) => t.partial += 1,
                    SignalOutcome::Failed(_) => t.failed += 1,
                }
                t
            })
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Runs the signal pipeline for a batch of assets.
pub struct BatchOrchestrator<'a> {
    service: &'a dyn PredictionService,
    market: &'a dyn MarketData,
    aggregator: SignalAggregator,
    threshold: f64,
    max_concurrency: usize,
}

impl<'a> BatchOrchestrator<'a> {
    pub fn new(
        service: &'a dyn PredictionService,
        market: &'a dyn MarketData,
        aggregator: SignalAggregator,
    ) -> Self {
        Self {
            service,
            market,
            aggregator,
            threshold: tradecast_core::prediction::DEFAULT_THRESHOLD,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Run one asset through fetch → aggregate.
    pub fn process_asset(&self, asset_id: &str) -> SignalOutcome {
        match self.service.fetch(asset_id, self.threshold) {
            Ok(mut response) => {
                // Correlate by the requested id, whatever the service echoed.
                response.asset_id = asset_id.to_string();
                self.aggregator.aggregate(&response, self.market)
            }
            Err(e) => SignalOutcome::Failed(AssetFailure::new(asset_id, PipelineError::from(e))),
        }
    }

    /// Process every asset with at most `max_concurrency` in flight.
    pub fn run(&self, assets: &[String]) -> Result<BatchReport, BatchError> {
        if assets.is_empty() {
            return Err(BatchError::NoAssets);
        }
        let pool = build_pool(self.max_concurrency)?;
        let total = assets.len();
        info!(
            assets = total,
            workers = self.max_concurrency,
            service = self.service.name(),
            market = self.market.name(),
            "starting signal batch"
        );

        let outcomes: Vec<SignalOutcome> = pool.install(|| {
            assets
                .par_iter()
                .enumerate()
                .map(|(i, asset_id)| {
                    let outcome = self.process_asset(asset_id);
                    log_outcome(i + 1, total, &outcome);
                    outcome
                })
                .collect()
        });

        let report = BatchReport { outcomes };
        let tally = report.tally();
        info!(
            full = tally.full,
            partial = tally.partial,
            failed = tally.failed,
            "signal batch finished"
        );
        Ok(report)
    }
}

fn log_outcome(position: usize, total: usize, outcome: &SignalOutcome) {
    let asset = outcome.asset_id();
    let kind = outcome.label();
    match outcome {
        SignalOutcome::Full(s) => info!(
            position,
            total,
            asset,
            kind,
            trade_type = %s.trade_type,
            confidence = %s.confidence,
            probability = s.probability,
            "asset processed"
        ),
        SignalOutcome::Partial(p) => debug!(
            position,
            total,
            asset,
            kind,
            reason = %p.reason,
            "asset processed"
        ),
        SignalOutcome::Failed(f) => warn!(
            position,
            total,
            asset,
            kind,
            error = %f.error,
            "asset processed"
        ),
    }
}
