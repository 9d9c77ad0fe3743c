//! Domain types for tradecast

pub mod bar;
pub mod outcome;
pub mod prediction;
pub mod signal;

pub use bar::{is_chronological, PriceBar};
pub use outcome::{TradeOutcome, TradeResult};
pub use prediction::PredictionResponse;
pub use signal::{
    AssetFailure, Confidence, ParseLabelError, PartialSignal, SignalOutcome, TradeSignal,
    TradeType,
};

/// Asset identifier (ticker symbol, e.g. `INFY.NS`).
pub type AssetId = String;
