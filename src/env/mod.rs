//! Market simulation: data series and the trading environment.

pub mod data;
pub mod trading;

pub use data::{generate_series, MarketData, SeriesConfig, DERIVED_FEATURE_WIDTH};
pub use trading::{StepInfo, StepResult, TradeRecord, TradingEnv, CONTEXT_FEATURES};
