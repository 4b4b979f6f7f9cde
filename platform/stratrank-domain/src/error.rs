use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error("no price data for {scope}")]
    DataNotFound { scope: String },
    #[error("invalid parameters for strategy '{strategy}': {reason}")]
    InvalidStrategyParameters { strategy: String, reason: String },
    #[error("unknown strategy '{0}'")]
    UnknownStrategy(String),
    #[error("market data source failed for {instrument}: {reason}")]
    DataSource { instrument: String, reason: String },
    #[error("result sink rejected run: {0}")]
    Sink(String),
    #[error("run lifecycle violation: {0}")]
    Lifecycle(String),
    #[error("cancelled")]
    Cancelled,
}

impl BacktestError {
    pub fn kind(&self) -> &'static str {
        match self {
            BacktestError::DataNotFound { .. } => "data_not_found",
            BacktestError::InvalidStrategyParameters { .. } => "invalid_strategy_parameters",
            BacktestError::UnknownStrategy(_) => "unknown_strategy",
            BacktestError::DataSource { .. } => "data_source",
            BacktestError::Sink(_) => "sink",
            BacktestError::Lifecycle(_) => "lifecycle",
            BacktestError::Cancelled => "cancelled",
        }
    }
}
