use crate::entities::backtest::BacktestRun;

/// Receives finished runs for persistence; only terminal runs are handed over.
pub trait ResultSink {
    fn store(&self, run: &BacktestRun) -> Result<(), String>;
}
