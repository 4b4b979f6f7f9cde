use crate::shared::parse_date;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use stratrank_domain::services::strategy::{StrategyParameters, StrategyRegistry};

pub use crate::shared::risk_free_rate;

pub const DEFAULT_PERIOD_DAYS: u32 = 1095;
pub const DEFAULT_MIN_TRADE_COUNT: u64 = 3;
pub const DEFAULT_TOP_N: usize = 5;
pub const DEFAULT_INITIAL_CAPITAL: f64 = 100_000.0;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub data: DataConfig,
    pub metrics: Option<MetricsConfig>,
    pub backtest: Option<BacktestSection>,
    pub ranking: Option<RankingSection>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct DataConfig {
    /// Directory holding one `<instrument>.csv` file per instrument.
    pub dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    pub risk_free_rate: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct BacktestSection {
    pub strategy: String,
    pub start: String,
    pub end: String,
    pub initial_capital: f64,
    pub universe: Vec<String>,
    #[serde(default)]
    pub parameters: StrategyParameters,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RankingSection {
    /// Defaults to every registered strategy.
    pub strategies: Option<Vec<String>>,
    pub universe: Vec<String>,
    pub period_days: Option<u32>,
    pub min_trade_count: Option<u64>,
    pub top_n: Option<usize>,
    pub initial_capital: Option<f64>,
    pub parallelism: Option<usize>,
    pub as_of: Option<String>,
}

pub fn load_config(path: &Path) -> Result<Config, String> {
    let contents = fs::read_to_string(path)
        .map_err(|err| format!("failed to read config {}: {}", path.display(), err))?;
    toml::from_str(&contents)
        .map_err(|err| format!("failed to parse TOML {}: {}", path.display(), err))
}

/// Semantic checks the TOML schema cannot express. All problems are reported together.
pub fn validate_config(config: &Config, registry: &StrategyRegistry) -> Result<(), String> {
    let mut problems: Vec<String> = Vec::new();

    if config.data.dir.trim().is_empty() {
        problems.push("data.dir cannot be empty".to_string());
    }

    if let Some(rate) = config.metrics.as_ref().and_then(|m| m.risk_free_rate) {
        if !rate.is_finite() {
            problems.push("metrics.risk_free_rate must be finite".to_string());
        }
    }

    if let Some(backtest) = &config.backtest {
        if !registry.contains(&backtest.strategy) {
            problems.push(format!(
                "backtest.strategy '{}' is not registered (known: {})",
                backtest.strategy,
                registry.identifiers().join(", ")
            ));
        }
        let start = parse_date("backtest.start", &backtest.start);
        let end = parse_date("backtest.end", &backtest.end);
        match (start, end) {
            (Ok(start), Ok(end)) if start > end => {
                problems.push("backtest.start must not be after backtest.end".to_string())
            }
            (start, end) => {
                problems.extend(start.err());
                problems.extend(end.err());
            }
        }
        if !backtest.initial_capital.is_finite() || backtest.initial_capital <= 0.0 {
            problems.push("backtest.initial_capital must be finite and > 0".to_string());
        }
        check_universe("backtest.universe", &backtest.universe, &mut problems);
    }

    if let Some(ranking) = &config.ranking {
        for strategy in ranking.strategies.iter().flatten() {
            if !registry.contains(strategy) {
                problems.push(format!(
                    "ranking.strategies: '{strategy}' is not registered"
                ));
            }
        }
        if ranking.strategies.as_ref().is_some_and(|s| s.is_empty()) {
            problems.push("ranking.strategies cannot be empty when given".to_string());
        }
        check_universe("ranking.universe", &ranking.universe, &mut problems);
        if ranking.period_days == Some(0) {
            problems.push("ranking.period_days must be > 0".to_string());
        }
        if ranking.top_n == Some(0) {
            problems.push("ranking.top_n must be > 0".to_string());
        }
        if ranking.parallelism == Some(0) {
            problems.push("ranking.parallelism must be > 0".to_string());
        }
        if let Some(capital) = ranking.initial_capital {
            if !capital.is_finite() || capital <= 0.0 {
                problems.push("ranking.initial_capital must be finite and > 0".to_string());
            }
        }
        if let Some(as_of) = &ranking.as_of {
            problems.extend(parse_date("ranking.as_of", as_of).err());
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(format!("invalid config:\n  - {}", problems.join("\n  - ")))
    }
}

fn check_universe(label: &str, universe: &[String], problems: &mut Vec<String>) {
    if universe.is_empty() {
        problems.push(format!("{label} cannot be empty"));
    }
    if universe.iter().any(|code| code.trim().is_empty()) {
        problems.push(format!("{label} contains an empty instrument code"));
    }
}

#[cfg(test)]
mod tests {
    use super::{load_config, validate_config, Config};
    use std::path::PathBuf;
    use stratrank_domain::services::strategy::StrategyRegistry;

    fn test_temp_dir(prefix: &str) -> PathBuf {
        let unique = format!(
            "{}_{}_{}",
            prefix,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .expect("clock before UNIX_EPOCH")
                .as_nanos()
        );
        let dir = std::env::temp_dir().join(unique);
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn parse_config(toml_str: &str) -> Config {
        toml::from_str(toml_str).expect("config should parse")
    }

    const FULL: &str = r#"
[data]
dir = "data/daily"

[metrics]
risk_free_rate = 0.02

[backtest]
strategy = "macd"
start = "2023-01-01"
end = "2023-12-31"
initial_capital = 100000.0
universe = ["sh.600036", "sz.000001"]

[backtest.parameters]
fast = 10
slow = 30

[ranking]
strategies = ["macd", "rsi"]
universe = ["sh.600036", "sz.000001", "sh.601318"]
period_days = 730
min_trade_count = 4
top_n = 2
parallelism = 4
as_of = "2024-06-30"
"#;

    #[test]
    fn load_config_reads_file_and_names_it_in_errors() {
        let dir = test_temp_dir("stratrank_config");
        let path = dir.join("stratrank.toml");
        std::fs::write(&path, FULL).expect("write config");
        let config = load_config(&path).expect("load");
        assert_eq!(config.data.dir, "data/daily");
        assert_eq!(
            config.backtest.as_ref().map(|b| b.strategy.as_str()),
            Some("macd")
        );

        let broken = dir.join("broken.toml");
        std::fs::write(&broken, "[data\ndir = 1").expect("write config");
        let err = load_config(&broken).expect_err("malformed");
        assert!(err.contains("broken.toml"), "{err}");

        let err = load_config(&dir.join("missing.toml")).expect_err("missing");
        assert!(err.starts_with("failed to read config"), "{err}");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn parse_config_rejects_malformed_toml() {
        let err = toml::from_str::<Config>("[data\ndir = 1").expect_err("malformed");
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn parse_config_rejects_unknown_fields() {
        let toml_str = r#"
[data]
dir = "data"
unknown_field = 123
"#;
        let err = toml::from_str::<Config>(toml_str).expect_err("unknown field should fail");
        assert!(err.to_string().to_lowercase().contains("unknown field"));
    }

    #[test]
    fn parse_full_config() {
        let config = parse_config(FULL);
        let backtest = config.backtest.as_ref().expect("backtest section");
        assert_eq!(backtest.universe.len(), 2);
        assert_eq!(backtest.parameters["fast"], serde_json::json!(10));
        let ranking = config.ranking.as_ref().expect("ranking section");
        assert_eq!(ranking.top_n, Some(2));
        validate_config(&config, &StrategyRegistry::builtin()).expect("valid");
    }

    #[test]
    fn minimal_config_only_needs_data_dir() {
        let config = parse_config("[data]\ndir = \"data\"\n");
        assert!(config.backtest.is_none());
        assert!(config.ranking.is_none());
        validate_config(&config, &StrategyRegistry::builtin()).expect("valid");
    }

    #[test]
    fn validation_reports_every_problem() {
        let toml_str = r#"
[data]
dir = ""

[backtest]
strategy = "bollinger"
start = "2023-12-31"
end = "2023-01-01"
initial_capital = 0.0
universe = []

[ranking]
universe = ["sh.600036"]
top_n = 0
as_of = "yesterday"
"#;
        let err = validate_config(&parse_config(toml_str), &StrategyRegistry::builtin())
            .expect_err("invalid");
        for needle in [
            "data.dir",
            "bollinger",
            "backtest.start must not be after",
            "initial_capital",
            "backtest.universe",
            "ranking.top_n",
            "ranking.as_of",
        ] {
            assert!(err.contains(needle), "missing '{needle}' in: {err}");
        }
    }
}
