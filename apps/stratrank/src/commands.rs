use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Instant;
use stratrank_application::backtesting::{resolve_backtest_config, run_backtest};
use stratrank_application::config::{load_config, risk_free_rate, validate_config, Config};
use stratrank_application::experiments::{
    rank_candidates_with_hooks, resolve_ranking_request, RankingProgress,
};
use stratrank_domain::services::strategy::StrategyRegistry;
use stratrank_infrastructure::market_data::CsvMarketDataSource;
use stratrank_infrastructure::sinks::InMemoryResultSink;

const PROGRESS_LOG_EVERY: usize = 10;

pub fn backtest(config_path: &Path) -> Result<(), String> {
    let registry = StrategyRegistry::builtin();
    let config = load_validated(config_path, &registry)?;
    let backtest_config = resolve_backtest_config(&config)?;
    let market_data = CsvMarketDataSource::new(data_dir(config_path, &config));
    let sink = InMemoryResultSink::new();

    let run_id = run_backtest(
        &backtest_config,
        risk_free_rate(&config),
        &registry,
        &market_data,
        &sink,
    )
    .map_err(|failure| failure.to_string())?;

    let run = sink
        .get(&run_id)
        .ok_or_else(|| format!("run {run_id} missing from result sink"))?;
    print_json(&run)
}

pub fn rank(config_path: &Path) -> Result<(), String> {
    let registry = StrategyRegistry::builtin();
    let config = load_validated(config_path, &registry)?;
    let today = chrono::Local::now().date_naive();
    let request = resolve_ranking_request(&config, &registry, today)?;
    let market_data = CsvMarketDataSource::new(data_dir(config_path, &config));

    let started = Instant::now();
    let mut on_progress = |progress: RankingProgress| {
        let done = progress.completed_candidates;
        if done > 0 && (done % PROGRESS_LOG_EVERY == 0 || done == progress.total_candidates) {
            tracing::info!(
                completed = done,
                total = progress.total_candidates,
                retained = progress.retained,
                filtered = progress.filtered,
                skipped = progress.skipped_candidates,
                "ranking progress"
            );
        }
    };
    let report = rank_candidates_with_hooks(
        &request,
        &registry,
        &market_data,
        Some(&mut on_progress),
        None,
    )
    .map_err(|err| format!("ranking failed: {err}"))?;
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        processed = report.processed,
        skipped = report.skipped,
        "ranking finished"
    );
    print_json(&report)
}

pub fn strategies() -> Result<(), String> {
    print_json(&StrategyRegistry::builtin().catalogue())
}

fn load_validated(config_path: &Path, registry: &StrategyRegistry) -> Result<Config, String> {
    let config = load_config(config_path)?;
    validate_config(&config, registry)?;
    Ok(config)
}

/// Relative `data.dir` values are resolved against the config file's directory.
fn data_dir(config_path: &Path, config: &Config) -> PathBuf {
    let dir = PathBuf::from(config.data.dir.trim());
    if dir.is_absolute() {
        return dir;
    }
    match config_path.parent() {
        Some(parent) => parent.join(dir),
        None => dir,
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| format!("failed to serialize output: {err}"))?;
    println!("{text}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::data_dir;
    use std::path::{Path, PathBuf};
    use stratrank_application::config::{Config, DataConfig};

    fn config(dir: &str) -> Config {
        Config {
            data: DataConfig {
                dir: dir.to_string(),
            },
            metrics: None,
            backtest: None,
            ranking: None,
        }
    }

    #[test]
    fn relative_data_dir_follows_the_config_file() {
        let got = data_dir(Path::new("/srv/stratrank/ranking.toml"), &config("prices"));
        assert_eq!(got, PathBuf::from("/srv/stratrank/prices"));
    }

    #[test]
    fn absolute_data_dir_is_kept() {
        let got = data_dir(Path::new("conf/ranking.toml"), &config("/data/daily"));
        assert_eq!(got, PathBuf::from("/data/daily"));
    }
}
