mod performance;
mod trade_stats;

pub use performance::{analyze_performance, TRADING_DAYS_PER_YEAR};
pub use trade_stats::analyze_trades;
