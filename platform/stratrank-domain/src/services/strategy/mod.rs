use crate::error::BacktestError;
use crate::value_objects::price_point::PricePoint;
use crate::value_objects::signal::{SignalAction, SignalRow};
use serde::Serialize;
use std::collections::BTreeMap;

mod dual_moving_average;
mod macd;
pub mod registry;
mod rsi;

pub use dual_moving_average::DualMovingAverage;
pub use macd::Macd;
pub use registry::StrategyRegistry;
pub use rsi::Rsi;

/// Raw parameter overrides as they arrive from configuration.
pub type StrategyParameters = BTreeMap<String, serde_json::Value>;

/// Maps a price series to one signal row per emitted date.
pub trait SignalProvider: Send + Sync {
    fn identifier(&self) -> &'static str;

    fn generate_signals(&self, prices: &[PricePoint]) -> Vec<SignalRow>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Integer,
    Number,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    pub label: &'static str,
    #[serde(rename = "type")]
    pub kind: ParamKind,
    pub default: f64,
    pub description: &'static str,
}

/// Parameter values after defaults were applied and overrides validated.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedParams {
    values: BTreeMap<&'static str, f64>,
}

impl ResolvedParams {
    pub fn get(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }

    pub fn window(&self, name: &str) -> usize {
        self.get(name) as usize
    }
}

/// Applies `overrides` on top of the schema defaults.
pub fn resolve_params(
    strategy: &str,
    specs: &[ParamSpec],
    overrides: &StrategyParameters,
) -> Result<ResolvedParams, BacktestError> {
    let invalid = |reason: String| BacktestError::InvalidStrategyParameters {
        strategy: strategy.to_string(),
        reason,
    };

    for name in overrides.keys() {
        if !specs.iter().any(|spec| spec.name == name) {
            return Err(invalid(format!("unknown parameter '{name}'")));
        }
    }

    let mut values = BTreeMap::new();
    for spec in specs {
        let value = match overrides.get(spec.name) {
            None => spec.default,
            Some(raw) => raw
                .as_f64()
                .filter(|value| value.is_finite())
                .ok_or_else(|| invalid(format!("'{}' must be a number, got {raw}", spec.name)))?,
        };
        if spec.kind == ParamKind::Integer && (value.fract() != 0.0 || value < 1.0) {
            return Err(invalid(format!(
                "'{}' must be a positive integer, got {value}",
                spec.name
            )));
        }
        values.insert(spec.name, value);
    }
    Ok(ResolvedParams { values })
}

/// Built-in strategies, addressed by their identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    DualMovingAverage,
    Macd,
    Rsi,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 3] = [
        StrategyKind::DualMovingAverage,
        StrategyKind::Macd,
        StrategyKind::Rsi,
    ];

    pub fn identifier(self) -> &'static str {
        match self {
            StrategyKind::DualMovingAverage => "dual_moving_average",
            StrategyKind::Macd => "macd",
            StrategyKind::Rsi => "rsi",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            StrategyKind::DualMovingAverage => "Dual Moving Average",
            StrategyKind::Macd => "Macd",
            StrategyKind::Rsi => "Rsi",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            StrategyKind::DualMovingAverage => {
                "Buys when the short moving average crosses above the long one, sells on the opposite cross."
            }
            StrategyKind::Macd => {
                "Buys when the MACD line crosses above its signal line, sells when it crosses below."
            }
            StrategyKind::Rsi => {
                "Buys when RSI rises back through the oversold line, sells when it falls back through the overbought line."
            }
        }
    }

    pub fn parameter_specs(self) -> Vec<ParamSpec> {
        match self {
            StrategyKind::DualMovingAverage => vec![
                ParamSpec {
                    name: "short_window",
                    label: "Short window",
                    kind: ParamKind::Integer,
                    default: 5.0,
                    description: "Window of the short moving average.",
                },
                ParamSpec {
                    name: "long_window",
                    label: "Long window",
                    kind: ParamKind::Integer,
                    default: 20.0,
                    description: "Window of the long moving average.",
                },
            ],
            StrategyKind::Macd => vec![
                ParamSpec {
                    name: "fast",
                    label: "Fast period",
                    kind: ParamKind::Integer,
                    default: 12.0,
                    description: "Period of the fast EMA.",
                },
                ParamSpec {
                    name: "slow",
                    label: "Slow period",
                    kind: ParamKind::Integer,
                    default: 26.0,
                    description: "Period of the slow EMA.",
                },
                ParamSpec {
                    name: "signal_period",
                    label: "Signal period",
                    kind: ParamKind::Integer,
                    default: 9.0,
                    description: "Period of the EMA over the MACD line.",
                },
            ],
            StrategyKind::Rsi => vec![
                ParamSpec {
                    name: "rsi_period",
                    label: "RSI period",
                    kind: ParamKind::Integer,
                    default: 14.0,
                    description: "Smoothing period of the RSI.",
                },
                ParamSpec {
                    name: "overbought_threshold",
                    label: "Overbought",
                    kind: ParamKind::Number,
                    default: 70.0,
                    description: "RSI level treated as overbought.",
                },
                ParamSpec {
                    name: "oversold_threshold",
                    label: "Oversold",
                    kind: ParamKind::Number,
                    default: 30.0,
                    description: "RSI level treated as oversold.",
                },
            ],
        }
    }

    /// Validates `overrides` and builds the provider.
    pub fn build(
        self,
        overrides: &StrategyParameters,
    ) -> Result<Box<dyn SignalProvider>, BacktestError> {
        let id = self.identifier();
        let params = resolve_params(id, &self.parameter_specs(), overrides)?;
        let invalid = |reason: &str| BacktestError::InvalidStrategyParameters {
            strategy: id.to_string(),
            reason: reason.to_string(),
        };

        match self {
            StrategyKind::DualMovingAverage => {
                let short = params.window("short_window");
                let long = params.window("long_window");
                if short >= long {
                    return Err(invalid("short_window must be smaller than long_window"));
                }
                Ok(Box::new(DualMovingAverage::new(short, long)))
            }
            StrategyKind::Macd => {
                let fast = params.window("fast");
                let slow = params.window("slow");
                if fast >= slow {
                    return Err(invalid("fast must be smaller than slow"));
                }
                Ok(Box::new(Macd::new(fast, slow, params.window("signal_period"))))
            }
            StrategyKind::Rsi => {
                let overbought = params.get("overbought_threshold");
                let oversold = params.get("oversold_threshold");
                if !(0.0..=100.0).contains(&overbought) || !(0.0..=100.0).contains(&oversold) {
                    return Err(invalid("thresholds must lie within [0, 100]"));
                }
                if oversold >= overbought {
                    return Err(invalid(
                        "oversold_threshold must be below overbought_threshold",
                    ));
                }
                Ok(Box::new(Rsi::new(
                    params.window("rsi_period"),
                    oversold,
                    overbought,
                )))
            }
        }
    }
}

/// Closes usable for indicator math, in input order.
fn tradable(prices: &[PricePoint]) -> impl Iterator<Item = &PricePoint> {
    prices.iter().filter(|point| point.has_tradable_close())
}

/// Cross of `value` over `line` between the previous and current row.
fn crossing(prev: f64, value: f64, up_line: f64, down_line: f64) -> SignalAction {
    if value > up_line && prev <= up_line {
        SignalAction::Buy
    } else if value < down_line && prev >= down_line {
        SignalAction::Sell
    } else {
        SignalAction::Hold
    }
}
