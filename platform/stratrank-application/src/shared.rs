use crate::config::{
    Config, DEFAULT_INITIAL_CAPITAL, DEFAULT_MIN_TRADE_COUNT, DEFAULT_PERIOD_DAYS, DEFAULT_TOP_N,
};
use crate::experiments::RankingRequest;
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use stratrank_domain::entities::backtest::{BacktestConfig, RunId};
use stratrank_domain::services::strategy::StrategyRegistry;
use stratrank_domain::value_objects::instrument::InstrumentId;

pub fn parse_date(label: &str, value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|err| format!("{label}: invalid date '{value}' (expected YYYY-MM-DD): {err}"))
}

pub fn risk_free_rate(config: &Config) -> f64 {
    config
        .metrics
        .as_ref()
        .and_then(|m| m.risk_free_rate)
        .unwrap_or(0.0)
}

fn instruments(codes: &[String]) -> Vec<InstrumentId> {
    codes
        .iter()
        .map(|code| InstrumentId::new(code.trim()))
        .collect()
}

pub fn resolve_backtest_config(config: &Config) -> Result<BacktestConfig, String> {
    let section = config
        .backtest
        .as_ref()
        .ok_or_else(|| "config has no [backtest] section".to_string())?;
    Ok(BacktestConfig {
        strategy_id: section.strategy.trim().to_string(),
        parameters: section.parameters.clone(),
        start_date: parse_date("backtest.start", &section.start)?,
        end_date: parse_date("backtest.end", &section.end)?,
        initial_capital: section.initial_capital,
        universe: instruments(&section.universe),
    })
}

pub fn resolve_ranking_request(
    config: &Config,
    registry: &StrategyRegistry,
    today: NaiveDate,
) -> Result<RankingRequest, String> {
    let section = config
        .ranking
        .as_ref()
        .ok_or_else(|| "config has no [ranking] section".to_string())?;
    let strategies = match &section.strategies {
        Some(list) => list.iter().map(|s| s.trim().to_string()).collect(),
        None => registry
            .identifiers()
            .into_iter()
            .map(str::to_string)
            .collect(),
    };
    let as_of = match &section.as_of {
        Some(value) => parse_date("ranking.as_of", value)?,
        None => today,
    };
    Ok(RankingRequest {
        strategies,
        universe: instruments(&section.universe),
        window_days: section.period_days.unwrap_or(DEFAULT_PERIOD_DAYS),
        as_of,
        min_trade_count: section.min_trade_count.unwrap_or(DEFAULT_MIN_TRADE_COUNT),
        top_n: section.top_n.unwrap_or(DEFAULT_TOP_N),
        initial_capital: section.initial_capital.unwrap_or(DEFAULT_INITIAL_CAPITAL),
        risk_free_rate: risk_free_rate(config),
        parallelism: section.parallelism.unwrap_or(1).max(1),
    })
}

/// `<strategy>__<hash>` where the hash covers the canonical JSON of the whole config.
pub fn derive_run_id(config: &BacktestConfig) -> RunId {
    let canonical = serde_json::to_string(config)
        .unwrap_or_else(|_| "{\"error\":\"config\"}".to_string());
    let mut hasher = Sha256::new();
    hasher.update(config.strategy_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical.as_bytes());
    let bytes = hasher.finalize();
    RunId::new(format!(
        "{}__{}",
        config.strategy_id,
        to_hex_short(&bytes[..], 12)
    ))
}

fn to_hex_short(bytes: &[u8], chars: usize) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(chars);
    for b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        if out.len() >= chars {
            break;
        }
        out.push(HEX[(b & 0x0f) as usize] as char);
        if out.len() >= chars {
            break;
        }
    }
    out
}
