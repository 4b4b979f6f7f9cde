use super::{crossing, tradable, SignalProvider};
use crate::services::indicators::Ema;
use crate::value_objects::price_point::PricePoint;
use crate::value_objects::signal::SignalRow;

#[derive(Debug, Clone)]
pub struct Macd {
    fast: usize,
    slow: usize,
    signal_period: usize,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal_period: usize) -> Self {
        Self {
            fast,
            slow,
            signal_period,
        }
    }
}

impl SignalProvider for Macd {
    fn identifier(&self) -> &'static str {
        "macd"
    }

    /// Rows are emitted only once the MACD line, the signal line and
    /// their previous values all exist.
    fn generate_signals(&self, prices: &[PricePoint]) -> Vec<SignalRow> {
        let mut fast = Ema::new(self.fast);
        let mut slow = Ema::new(self.slow);
        let mut signal_line = Ema::new(self.signal_period);
        let mut prev_spread: Option<f64> = None;
        let mut rows = Vec::new();

        for point in tradable(prices) {
            let (Some(f), Some(s)) = (fast.update(point.close), slow.update(point.close)) else {
                continue;
            };
            let macd = f - s;
            let Some(sig) = signal_line.update(macd) else {
                continue;
            };
            let spread = macd - sig;
            if let Some(prev) = prev_spread {
                rows.push(SignalRow {
                    date: point.date,
                    close: point.close,
                    signal: crossing(prev, spread, 0.0, 0.0),
                });
            }
            prev_spread = Some(spread);
        }
        rows
    }
}
