use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TradeStatistics {
    /// Raw number of recorded trades, buys and sells alike.
    pub total_trades: u64,
    pub closed_trades: u64,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub win_rate: f64,
    /// `+inf` when there are wins and no losses; JSON has no infinity, so it is
    /// written as `null`.
    pub profit_factor: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub avg_holding_days: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::TradeStatistics;

    #[test]
    fn infinite_profit_factor_is_written_as_null() {
        let stats = TradeStatistics {
            total_trades: 2,
            closed_trades: 1,
            winning_trades: 1,
            win_rate: 1.0,
            profit_factor: f64::INFINITY,
            gross_profit: 5.0,
            avg_win: 5.0,
            ..TradeStatistics::default()
        };
        let json = serde_json::to_value(&stats).expect("json");
        assert!(json["profit_factor"].is_null());
        assert_eq!(json["gross_profit"], serde_json::json!(5.0));
    }
}
