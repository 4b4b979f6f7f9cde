use super::{tradable, SignalProvider};
use crate::services::indicators::RollingMean;
use crate::value_objects::price_point::PricePoint;
use crate::value_objects::signal::{SignalAction, SignalRow};

/// Golden/death cross of two partial-window moving averages.
#[derive(Debug, Clone)]
pub struct DualMovingAverage {
    short_window: usize,
    long_window: usize,
}

impl DualMovingAverage {
    pub fn new(short_window: usize, long_window: usize) -> Self {
        Self {
            short_window,
            long_window,
        }
    }
}

impl SignalProvider for DualMovingAverage {
    fn identifier(&self) -> &'static str {
        "dual_moving_average"
    }

    fn generate_signals(&self, prices: &[PricePoint]) -> Vec<SignalRow> {
        let mut short = RollingMean::new(self.short_window);
        let mut long = RollingMean::new(self.long_window);
        let mut prev_above: Option<bool> = None;

        tradable(prices)
            .map(|point| {
                let above = short.update(point.close) > long.update(point.close);
                let signal = match (prev_above, above) {
                    (Some(false), true) => SignalAction::Buy,
                    (Some(true), false) => SignalAction::Sell,
                    _ => SignalAction::Hold,
                };
                prev_above = Some(above);
                SignalRow {
                    date: point.date,
                    close: point.close,
                    signal,
                }
            })
            .collect()
    }
}
