use crate::entities::backtest::RunId;
use crate::value_objects::instrument::InstrumentId;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedInstrument {
    pub rank: usize,
    pub instrument: InstrumentId,
    /// Wilson lower bound of the win rate.
    pub score: f64,
    pub win_rate: f64,
    pub trade_count: u64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub expectancy: f64,
    /// Serialized as `null` when infinite (wins without losses).
    pub profit_factor: f64,
    pub run_id: RunId,
}
