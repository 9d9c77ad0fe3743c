//! Tradecast Core — domain types, prediction client, market data, signal
//! aggregation and the backtest simulator.
//!
//! This crate holds everything that operates on a single asset:
//! - Domain types (price bars, prediction responses, signals, outcomes)
//! - Per-asset error taxonomy
//! - Prediction service client (trait + HTTP implementation)
//! - Market data providers (Yahoo chart API, CSV files)
//! - Signal aggregation policy (direction, confidence tier, price levels)
//! - Single-pass replay of a signal over a close series
//! - The persisted signal table contract
//! - Asset universe loading and sampling
//!
//! Batch fan-out lives in `tradecast-runner`.

pub mod domain;
pub mod error;
pub mod market;
pub mod prediction;
pub mod signal;
pub mod simulator;
pub mod table;
pub mod universe;

#[cfg(test)]
mod test_server;

pub use error::PipelineError;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything the batch layer moves across worker
    /// threads is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::PriceBar>();
        require_sync::<domain::PriceBar>();
        require_send::<domain::PredictionResponse>();
        require_sync::<domain::PredictionResponse>();
        require_send::<domain::SignalOutcome>();
        require_sync::<domain::SignalOutcome>();
        require_send::<domain::TradeOutcome>();
        require_sync::<domain::TradeOutcome>();
        require_send::<PipelineError>();
        require_sync::<PipelineError>();

        require_send::<signal::SignalAggregator>();
        require_sync::<signal::SignalAggregator>();
        require_send::<simulator::ReplayParams>();
        require_sync::<simulator::ReplayParams>();
        require_send::<prediction::HttpPredictionClient>();
        require_sync::<prediction::HttpPredictionClient>();
        require_send::<market::YahooProvider>();
        require_sync::<market::YahooProvider>();
        require_send::<market::CsvBarProvider>();
        require_sync::<market::CsvBarProvider>();
    }

    /// Architecture contract: the simulator takes no market data handle.
    ///
    /// `simulate()` sees only the signal, the bars and the entry rules, so a
    /// replay cannot fetch data or carry state between invocations.
    #[test]
    fn simulator_has_no_data_source_parameter() {
        fn _check(
            signal: &domain::TradeSignal,
            bars: &[domain::PriceBar],
            params: &simulator::ReplayParams,
        ) -> domain::TradeOutcome {
            simulator::simulate(signal, bars, params)
        }
    }
}
