pub mod backtest;
pub mod metrics;
pub mod portfolio;
pub mod ranking;
