use crate::entities::metrics::{PerformanceMetrics, TradeStatistics};
use crate::services::strategy::StrategyParameters;
use crate::value_objects::instrument::InstrumentId;
use crate::value_objects::snapshot::PortfolioSnapshot;
use crate::value_objects::trade::Trade;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub strategy_id: String,
    #[serde(default)]
    pub parameters: StrategyParameters,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: f64,
    pub universe: Vec<InstrumentId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub run_id: RunId,
    pub config: BacktestConfig,
    pub equity_curve: Vec<PortfolioSnapshot>,
    pub trades: Vec<Trade>,
    pub final_value: f64,
    pub total_return: f64,
    pub performance: PerformanceMetrics,
    pub trade_stats: TradeStatistics,
    /// Universe members that had no price rows in the window.
    pub skipped_instruments: Vec<InstrumentId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Created,
    Running,
    Completed { result: Box<BacktestResult> },
    Failed { error: String },
}

impl RunStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RunStatus::Created => "created",
            RunStatus::Running => "running",
            RunStatus::Completed { .. } => "completed",
            RunStatus::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed { .. } | RunStatus::Failed { .. })
    }
}

/// Lifecycle record of one backtest: `Created -> Running -> {Completed, Failed}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestRun {
    pub run_id: RunId,
    pub config: BacktestConfig,
    #[serde(flatten)]
    status: RunStatus,
}

impl BacktestRun {
    pub fn new(run_id: RunId, config: BacktestConfig) -> Self {
        Self {
            run_id,
            config,
            status: RunStatus::Created,
        }
    }

    pub fn status(&self) -> &RunStatus {
        &self.status
    }

    pub fn result(&self) -> Option<&BacktestResult> {
        match &self.status {
            RunStatus::Completed { result } => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            RunStatus::Failed { error } => Some(error),
            _ => None,
        }
    }

    pub fn start(&mut self) -> Result<(), String> {
        match self.status {
            RunStatus::Created => {
                self.status = RunStatus::Running;
                Ok(())
            }
            _ => Err(self.invalid_transition("running")),
        }
    }

    pub fn complete(&mut self, result: BacktestResult) -> Result<(), String> {
        match self.status {
            RunStatus::Running => {
                self.status = RunStatus::Completed {
                    result: Box::new(result),
                };
                Ok(())
            }
            _ => Err(self.invalid_transition("completed")),
        }
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), String> {
        match self.status {
            RunStatus::Running => {
                self.status = RunStatus::Failed {
                    error: error.into(),
                };
                Ok(())
            }
            _ => Err(self.invalid_transition("failed")),
        }
    }

    fn invalid_transition(&self, to: &str) -> String {
        format!(
            "run {}: invalid transition {} -> {}",
            self.run_id,
            self.status.label(),
            to
        )
    }
}
