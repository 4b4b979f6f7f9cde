use crate::entities::portfolio::Portfolio;
use crate::error::BacktestError;
use crate::value_objects::instrument::InstrumentId;
use crate::value_objects::price_point::PricePoint;
use crate::value_objects::side::Side;
use crate::value_objects::signal::{SignalAction, SignalRow};
use crate::value_objects::snapshot::PortfolioSnapshot;
use crate::value_objects::trade::Trade;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Entries are skipped once cash drops to this level or below.
pub const MIN_ENTRY_CASH: f64 = 1.0;

pub type PriceTable = BTreeMap<InstrumentId, Vec<PricePoint>>;
pub type SignalTable = BTreeMap<InstrumentId, Vec<SignalRow>>;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutput {
    pub equity_curve: Vec<PortfolioSnapshot>,
    pub trades: Vec<Trade>,
    pub final_cash: f64,
}

/// Day-by-day long-only replay of signals over a fixed instrument universe.
///
/// Each trading date runs an exit pass (sell signals on held instruments) before an
/// entry pass that splits the available cash evenly across flat instruments with a
/// buy signal. Instruments without a usable close on a date are left untouched.
#[derive(Debug, Clone)]
pub struct PortfolioSimulator {
    initial_capital: f64,
    universe: Vec<InstrumentId>,
}

impl PortfolioSimulator {
    pub fn new(initial_capital: f64, universe: &[InstrumentId]) -> Self {
        let mut seen = BTreeSet::new();
        let universe = universe
            .iter()
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect();
        Self {
            initial_capital,
            universe,
        }
    }

    pub fn run(
        &self,
        prices: &PriceTable,
        signals: &SignalTable,
    ) -> Result<SimulationOutput, BacktestError> {
        let closes = self.close_index(prices);
        if closes.is_empty() {
            return Err(BacktestError::DataNotFound {
                scope: format!("universe of {} instrument(s)", self.universe.len()),
            });
        }
        let signal_index = self.signal_index(signals);

        let mut portfolio = Portfolio::new_with_cash(self.initial_capital);
        let mut trades = Vec::new();
        let mut equity_curve = Vec::with_capacity(closes.len());

        for (date, today) in &closes {
            let signal_for = |id: &InstrumentId| signal_index.get(&(id, *date)).copied();

            for id in &self.universe {
                let Some(price) = today.get(id).copied() else {
                    continue;
                };
                if portfolio.is_flat(id) || signal_for(id) != Some(SignalAction::Sell) {
                    continue;
                }
                if let Some((quantity, proceeds)) = portfolio.liquidate(id, price) {
                    trades.push(Trade {
                        instrument: id.clone(),
                        date: *date,
                        side: Side::Sell,
                        price,
                        quantity,
                        amount: proceeds,
                        cash_after: portfolio.cash(),
                    });
                }
            }

            let candidates: Vec<(&InstrumentId, f64)> = self
                .universe
                .iter()
                .filter(|id| portfolio.is_flat(id) && signal_for(*id) == Some(SignalAction::Buy))
                .filter_map(|id| today.get(id).map(|price| (id, *price)))
                .collect();

            if !candidates.is_empty() && portfolio.cash() > MIN_ENTRY_CASH {
                let allocation = portfolio.cash() / candidates.len() as f64;
                for (id, price) in candidates {
                    let mut quantity = (allocation / price).floor() as u64;
                    while quantity > 0 && quantity as f64 * price > portfolio.cash() {
                        quantity -= 1;
                    }
                    if quantity == 0 {
                        continue;
                    }
                    let amount = portfolio.open(id, quantity, price);
                    trades.push(Trade {
                        instrument: id.clone(),
                        date: *date,
                        side: Side::Buy,
                        price,
                        quantity,
                        amount,
                        cash_after: portfolio.cash(),
                    });
                }
            }

            equity_curve.push(PortfolioSnapshot {
                date: *date,
                cash: portfolio.cash(),
                total_value: portfolio.cash() + portfolio.market_value(today),
            });
        }

        Ok(SimulationOutput {
            equity_curve,
            trades,
            final_cash: portfolio.cash(),
        })
    }

    /// Trading calendar with the usable closes of each date.
    fn close_index<'a>(
        &'a self,
        prices: &'a PriceTable,
    ) -> BTreeMap<NaiveDate, BTreeMap<&'a InstrumentId, f64>> {
        let mut index: BTreeMap<NaiveDate, BTreeMap<&InstrumentId, f64>> = BTreeMap::new();
        for id in &self.universe {
            let Some(series) = prices.get(id) else {
                continue;
            };
            for point in series {
                let day = index.entry(point.date).or_default();
                if point.has_tradable_close() {
                    day.insert(id, point.close);
                }
            }
        }
        index
    }

    fn signal_index<'a>(
        &'a self,
        signals: &'a SignalTable,
    ) -> BTreeMap<(&'a InstrumentId, NaiveDate), SignalAction> {
        let mut index = BTreeMap::new();
        for id in &self.universe {
            if let Some(rows) = signals.get(id) {
                for row in rows {
                    index.insert((id, row.date), row.signal);
                }
            }
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::{PortfolioSimulator, PriceTable, SignalTable};
    use crate::error::BacktestError;
    use crate::value_objects::instrument::InstrumentId;
    use crate::value_objects::price_point::PricePoint;
    use crate::value_objects::side::Side;
    use crate::value_objects::signal::{SignalAction, SignalRow};
    use chrono::{Days, NaiveDate};

    fn day(offset: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Days::new(offset)
    }

    fn series(id: &InstrumentId, closes: &[f64]) -> Vec<PricePoint> {
        closes
            .iter()
            .enumerate()
            .map(|(i, close)| PricePoint {
                instrument: id.clone(),
                date: day(i as u64),
                open: *close,
                high: *close,
                low: *close,
                close: *close,
                volume: 1_000.0,
            })
            .collect()
    }

    fn signal_rows(closes: &[f64], actions: &[SignalAction]) -> Vec<SignalRow> {
        closes
            .iter()
            .zip(actions)
            .enumerate()
            .map(|(i, (close, signal))| SignalRow {
                date: day(i as u64),
                close: *close,
                signal: *signal,
            })
            .collect()
    }

    #[test]
    fn empty_price_table_is_data_not_found() {
        let sim = PortfolioSimulator::new(1_000.0, &[InstrumentId::from("sh.600000")]);
        let err = sim.run(&PriceTable::new(), &SignalTable::new()).unwrap_err();
        assert!(matches!(err, BacktestError::DataNotFound { .. }));
    }

    #[test]
    fn sell_is_processed_before_buy_on_same_day() {
        use SignalAction::*;
        let a = InstrumentId::from("sh.600000");
        let b = InstrumentId::from("sz.000001");
        let mut prices = PriceTable::new();
        prices.insert(a.clone(), series(&a, &[10.0, 10.0]));
        prices.insert(b.clone(), series(&b, &[5.0, 5.0]));
        let mut signals = SignalTable::new();
        signals.insert(a.clone(), signal_rows(&[10.0, 10.0], &[Buy, Sell]));
        signals.insert(b.clone(), signal_rows(&[5.0, 5.0], &[Hold, Buy]));

        let out = PortfolioSimulator::new(1_000.0, &[a.clone(), b.clone()])
            .run(&prices, &signals)
            .expect("run");

        assert_eq!(out.trades.len(), 3);
        assert_eq!(out.trades[1].side, Side::Sell);
        assert_eq!(out.trades[2].instrument, b);
        // proceeds of the sale fund the new entry
        assert_eq!(out.trades[2].quantity, 200);
        assert!(out.final_cash.abs() < 1e-9);
    }

    #[test]
    fn missing_price_skips_instrument_for_the_day() {
        use SignalAction::*;
        let a = InstrumentId::from("sh.600000");
        let b = InstrumentId::from("sz.000001");
        let mut prices = PriceTable::new();
        prices.insert(a.clone(), series(&a, &[10.0, 11.0]));
        // b only trades on the second day
        let mut b_series = series(&b, &[0.0, 20.0]);
        b_series.remove(0);
        prices.insert(b.clone(), b_series);
        let mut signals = SignalTable::new();
        signals.insert(b.clone(), signal_rows(&[20.0, 20.0], &[Buy, Hold]));

        let out = PortfolioSimulator::new(1_000.0, &[a, b])
            .run(&prices, &signals)
            .expect("run");
        assert!(out.trades.is_empty());
        assert_eq!(out.equity_curve.len(), 2);
    }

    #[test]
    fn no_entry_when_cash_is_negligible() {
        use SignalAction::*;
        let a = InstrumentId::from("sh.600000");
        let mut prices = PriceTable::new();
        prices.insert(a.clone(), series(&a, &[0.5, 0.5]));
        let mut signals = SignalTable::new();
        signals.insert(a.clone(), signal_rows(&[0.5, 0.5], &[Buy, Buy]));

        let out = PortfolioSimulator::new(1.0, &[a])
            .run(&prices, &signals)
            .expect("run");
        assert!(out.trades.is_empty());
        assert_eq!(out.final_cash, 1.0);
    }

    #[test]
    fn unaffordable_candidate_gets_no_trade() {
        use SignalAction::*;
        let a = InstrumentId::from("sh.600000");
        let mut prices = PriceTable::new();
        prices.insert(a.clone(), series(&a, &[500.0]));
        let mut signals = SignalTable::new();
        signals.insert(a.clone(), signal_rows(&[500.0], &[Buy]));

        let out = PortfolioSimulator::new(100.0, &[a])
            .run(&prices, &signals)
            .expect("run");
        assert!(out.trades.is_empty());
        assert_eq!(out.equity_curve[0].total_value, 100.0);
    }
}
