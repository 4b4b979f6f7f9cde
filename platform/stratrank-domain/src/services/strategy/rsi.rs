use super::{crossing, tradable, SignalProvider};
use crate::services::indicators::RmaRsi;
use crate::value_objects::price_point::PricePoint;
use crate::value_objects::signal::{SignalAction, SignalRow};

/// Mean reversion on the RSI leaving its oversold and overbought bands.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    oversold: f64,
    overbought: f64,
}

impl Rsi {
    pub fn new(period: usize, oversold: f64, overbought: f64) -> Self {
        Self {
            period,
            oversold,
            overbought,
        }
    }
}

impl SignalProvider for Rsi {
    fn identifier(&self) -> &'static str {
        "rsi"
    }

    fn generate_signals(&self, prices: &[PricePoint]) -> Vec<SignalRow> {
        let mut rsi = RmaRsi::new(self.period);
        let mut prev: Option<f64> = None;
        let mut rows = Vec::new();

        for point in tradable(prices) {
            let Some(value) = rsi.update(point.close) else {
                continue;
            };
            let signal = match prev {
                Some(prev) => crossing(prev, value, self.oversold, self.overbought),
                None => SignalAction::Hold,
            };
            prev = Some(value);
            rows.push(SignalRow {
                date: point.date,
                close: point.close,
                signal,
            });
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::Rsi;
    use crate::services::strategy::SignalProvider;
    use crate::value_objects::instrument::InstrumentId;
    use crate::value_objects::price_point::PricePoint;
    use crate::value_objects::signal::SignalAction;
    use chrono::{Days, NaiveDate};

    #[test]
    fn flat_stretches_produce_no_rows() {
        let start = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        let prices: Vec<PricePoint> = [10.0, 10.0, 10.0, 11.0, 10.0]
            .iter()
            .enumerate()
            .map(|(i, close)| PricePoint {
                instrument: InstrumentId::from("sz.000001"),
                date: start + Days::new(i as u64),
                open: *close,
                high: *close,
                low: *close,
                close: *close,
                volume: 1.0,
            })
            .collect();

        let rows = Rsi::new(2, 30.0, 70.0).generate_signals(&prices);
        let got: Vec<(NaiveDate, SignalAction)> =
            rows.iter().map(|row| (row.date, row.signal)).collect();
        // 100 after the first gain, then 100 * 0.5 / 1.5 once the loss arrives
        assert_eq!(
            got,
            vec![
                (start + Days::new(3), SignalAction::Hold),
                (start + Days::new(4), SignalAction::Sell),
            ]
        );
    }
}
