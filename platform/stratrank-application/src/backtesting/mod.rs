use chrono::NaiveDate;
use std::fmt;
use std::time::Instant;
use stratrank_domain::entities::backtest::{BacktestConfig, BacktestResult, BacktestRun, RunId};
use stratrank_domain::error::BacktestError;
use stratrank_domain::repositories::market_data::MarketDataSource;
use stratrank_domain::repositories::result_sink::ResultSink;
use stratrank_domain::services::analyzers::{analyze_performance, analyze_trades};
use stratrank_domain::services::simulator::{PortfolioSimulator, PriceTable, SignalTable};
use stratrank_domain::services::strategy::{SignalProvider, StrategyRegistry};
use stratrank_domain::value_objects::instrument::InstrumentId;
use tracing::info_span;

pub use crate::shared::{derive_run_id, resolve_backtest_config};

/// A run that ended in `Failed` (or could not be handed to the sink).
#[derive(Debug, Clone, PartialEq)]
pub struct RunFailure {
    pub run_id: RunId,
    pub error: BacktestError,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run {} failed: {}", self.run_id, self.error)
    }
}

impl std::error::Error for RunFailure {}

/// Fetches every universe member once. Instruments without rows are returned as skipped.
pub fn load_price_table(
    market_data: &dyn MarketDataSource,
    universe: &[InstrumentId],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<(PriceTable, Vec<InstrumentId>), BacktestError> {
    let stage_start = Instant::now();
    let mut prices = PriceTable::new();
    let mut skipped = Vec::new();

    for id in universe {
        if prices.contains_key(id) || skipped.contains(id) {
            continue;
        }
        let series = market_data
            .get_price_history(id, start, end)
            .map_err(|reason| BacktestError::DataSource {
                instrument: id.to_string(),
                reason,
            })?;
        if series.is_empty() {
            tracing::warn!(instrument = %id, "no price rows in window; skipping instrument");
            skipped.push(id.clone());
            continue;
        }
        prices.insert(id.clone(), series);
    }

    metrics::histogram!("stratrank.backtest.load_prices_ms")
        .record(stage_start.elapsed().as_millis() as f64);
    Ok((prices, skipped))
}

/// Runs the provider over the loaded prices, simulates and analyzes the result.
pub fn simulate_backtest(
    run_id: &RunId,
    config: &BacktestConfig,
    provider: &dyn SignalProvider,
    prices: &PriceTable,
    skipped_instruments: Vec<InstrumentId>,
    risk_free_rate: f64,
) -> Result<BacktestResult, BacktestError> {
    let stage_start = Instant::now();

    let signals: SignalTable = prices
        .iter()
        .map(|(id, series)| (id.clone(), provider.generate_signals(series)))
        .collect();

    let output = PortfolioSimulator::new(config.initial_capital, &config.universe)
        .run(prices, &signals)?;
    for trade in &output.trades {
        tracing::debug!(
            instrument = %trade.instrument,
            date = %trade.date,
            side = ?trade.side,
            price = trade.price,
            quantity = trade.quantity,
            cash_after = trade.cash_after,
            "trade"
        );
    }

    let final_value = output
        .equity_curve
        .last()
        .map(|snapshot| snapshot.total_value)
        .unwrap_or(config.initial_capital);
    let total_return = if config.initial_capital > 0.0 {
        (final_value - config.initial_capital) / config.initial_capital
    } else {
        0.0
    };
    let performance = analyze_performance(&output.equity_curve, risk_free_rate);
    let trade_stats = analyze_trades(&output.trades, &config.universe);

    metrics::histogram!("stratrank.backtest.simulate_ms")
        .record(stage_start.elapsed().as_millis() as f64);

    Ok(BacktestResult {
        run_id: run_id.clone(),
        config: config.clone(),
        equity_curve: output.equity_curve,
        trades: output.trades,
        final_value,
        total_return,
        performance,
        trade_stats,
        skipped_instruments,
    })
}

/// Validates parameters, loads prices and simulates, without touching any sink.
pub fn execute_backtest(
    run_id: &RunId,
    config: &BacktestConfig,
    risk_free_rate: f64,
    registry: &StrategyRegistry,
    market_data: &dyn MarketDataSource,
) -> Result<BacktestResult, BacktestError> {
    let provider = registry.build(&config.strategy_id, &config.parameters)?;
    if config.universe.is_empty() {
        return Err(BacktestError::DataNotFound {
            scope: "empty universe".to_string(),
        });
    }
    let (prices, skipped) = load_price_table(
        market_data,
        &config.universe,
        config.start_date,
        config.end_date,
    )?;
    simulate_backtest(
        run_id,
        config,
        provider.as_ref(),
        &prices,
        skipped,
        risk_free_rate,
    )
}

/// Drives one run through `Created -> Running -> {Completed, Failed}` and stores the
/// terminal record in `sink`.
pub fn run_backtest(
    config: &BacktestConfig,
    risk_free_rate: f64,
    registry: &StrategyRegistry,
    market_data: &dyn MarketDataSource,
    sink: &dyn ResultSink,
) -> Result<RunId, RunFailure> {
    let run_id = derive_run_id(config);
    let _span = info_span!(
        "run_backtest",
        run_id = %run_id,
        strategy = %config.strategy_id,
        instruments = config.universe.len()
    )
    .entered();
    let run_start = Instant::now();
    let failure = |error: BacktestError| RunFailure {
        run_id: run_id.clone(),
        error,
    };

    let mut run = BacktestRun::new(run_id.clone(), config.clone());
    run.start()
        .map_err(|err| failure(BacktestError::Lifecycle(err)))?;
    tracing::info!(
        start = %config.start_date,
        end = %config.end_date,
        initial_capital = config.initial_capital,
        "backtest started"
    );

    let outcome = execute_backtest(&run_id, config, risk_free_rate, registry, market_data);
    let run_error = match outcome {
        Ok(result) => {
            tracing::info!(
                final_value = result.final_value,
                total_return = result.total_return,
                trades = result.trade_stats.total_trades,
                win_rate = result.trade_stats.win_rate,
                sharpe = result.performance.sharpe_ratio,
                max_drawdown = result.performance.max_drawdown,
                "backtest completed"
            );
            run.complete(result)
                .map_err(|err| failure(BacktestError::Lifecycle(err)))?;
            None
        }
        Err(err) => {
            tracing::warn!(kind = err.kind(), error = %err, "backtest failed");
            run.fail(err.to_string())
                .map_err(|err| failure(BacktestError::Lifecycle(err)))?;
            Some(err)
        }
    };

    let status = run.status().label();
    metrics::counter!("stratrank.backtest.runs_total", "status" => status).increment(1);
    metrics::histogram!("stratrank.backtest.run_ms", "status" => status)
        .record(run_start.elapsed().as_millis() as f64);

    sink.store(&run)
        .map_err(|reason| failure(BacktestError::Sink(reason)))?;

    match run_error {
        None => Ok(run_id.clone()),
        Some(error) => Err(failure(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::{load_price_table, RunFailure};
    use chrono::NaiveDate;
    use std::cell::RefCell;
    use stratrank_domain::entities::backtest::{BacktestConfig, RunId};
    use stratrank_domain::error::BacktestError;
    use stratrank_domain::repositories::market_data::MarketDataSource;
    use stratrank_domain::value_objects::instrument::InstrumentId;
    use stratrank_domain::value_objects::price_point::PricePoint;

    struct CountingSource {
        calls: RefCell<Vec<String>>,
    }

    impl MarketDataSource for CountingSource {
        fn get_price_history(
            &self,
            instrument: &InstrumentId,
            start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<PricePoint>, String> {
            self.calls.borrow_mut().push(instrument.to_string());
            match instrument.as_str() {
                "sh.broken" => Err("disk on fire".to_string()),
                "sz.empty" => Ok(Vec::new()),
                _ => Ok(vec![PricePoint {
                    instrument: instrument.clone(),
                    date: start,
                    open: 1.0,
                    high: 1.0,
                    low: 1.0,
                    close: 1.0,
                    volume: 1.0,
                }]),
            }
        }
    }

    fn config(universe: &[&str]) -> BacktestConfig {
        BacktestConfig {
            strategy_id: "macd".to_string(),
            parameters: Default::default(),
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            initial_capital: 1_000.0,
            universe: universe.iter().map(|c| InstrumentId::from(*c)).collect(),
        }
    }

    #[test]
    fn empty_series_are_skipped_and_duplicates_fetched_once() {
        let source = CountingSource {
            calls: RefCell::new(Vec::new()),
        };
        let cfg = config(&["sh.600036", "sz.empty", "sh.600036"]);
        let (prices, skipped) =
            load_price_table(&source, &cfg.universe, cfg.start_date, cfg.end_date)
                .expect("load");
        assert_eq!(prices.len(), 1);
        assert_eq!(skipped, vec![InstrumentId::from("sz.empty")]);
        assert_eq!(source.calls.borrow().len(), 2);
    }

    #[test]
    fn source_errors_name_the_instrument() {
        let source = CountingSource {
            calls: RefCell::new(Vec::new()),
        };
        let cfg = config(&["sh.broken"]);
        let err = load_price_table(&source, &cfg.universe, cfg.start_date, cfg.end_date)
            .unwrap_err();
        assert_eq!(
            err,
            BacktestError::DataSource {
                instrument: "sh.broken".to_string(),
                reason: "disk on fire".to_string()
            }
        );
    }

    #[test]
    fn failure_display_carries_run_id() {
        let failure = RunFailure {
            run_id: RunId::new("macd__0123456789ab"),
            error: BacktestError::Cancelled,
        };
        assert_eq!(failure.to_string(), "run macd__0123456789ab failed: cancelled");
    }
}
