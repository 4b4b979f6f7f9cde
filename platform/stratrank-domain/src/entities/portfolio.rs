use crate::value_objects::instrument::InstrumentId;
use std::collections::BTreeMap;

/// Cash plus whole-share long positions for a single simulation run.
#[derive(Debug, Default, Clone)]
pub struct Portfolio {
    positions: BTreeMap<InstrumentId, u64>,
    cash: f64,
}

impl Portfolio {
    pub fn new_with_cash(initial_cash: f64) -> Self {
        Self {
            positions: BTreeMap::new(),
            cash: initial_cash,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn position_qty(&self, instrument: &InstrumentId) -> u64 {
        self.positions.get(instrument).copied().unwrap_or(0)
    }

    pub fn is_flat(&self, instrument: &InstrumentId) -> bool {
        self.position_qty(instrument) == 0
    }

    /// Opens a position and returns the debited amount.
    pub fn open(&mut self, instrument: &InstrumentId, quantity: u64, price: f64) -> f64 {
        if quantity == 0 {
            return 0.0;
        }
        let amount = quantity as f64 * price;
        self.cash -= amount;
        if self.cash < 0.0 && self.cash > -1e-9 {
            self.cash = 0.0;
        }
        *self.positions.entry(instrument.clone()).or_insert(0) += quantity;
        amount
    }

    /// Sells the whole position, returning `(quantity, proceeds)`.
    pub fn liquidate(&mut self, instrument: &InstrumentId, price: f64) -> Option<(u64, f64)> {
        let quantity = self.positions.remove(instrument).filter(|qty| *qty > 0)?;
        let proceeds = quantity as f64 * price;
        self.cash += proceeds;
        Some((quantity, proceeds))
    }

    /// Marks held positions to the given closes; instruments without a close are left out.
    pub fn market_value(&self, closes: &BTreeMap<&InstrumentId, f64>) -> f64 {
        self.positions
            .iter()
            .filter_map(|(id, qty)| closes.get(id).map(|close| *qty as f64 * close))
            .sum()
    }
}
