use chrono::NaiveDate;
use std::collections::BTreeMap;
use stratrank_domain::repositories::market_data::MarketDataSource;
use stratrank_domain::value_objects::instrument::InstrumentId;
use stratrank_domain::value_objects::price_point::PricePoint;

/// Pre-loaded price series, useful for tests and replaying snapshots.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMarketDataSource {
    series: BTreeMap<InstrumentId, Vec<PricePoint>>,
}

impl InMemoryMarketDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the series of `instrument`; rows are kept sorted by date.
    pub fn insert(&mut self, instrument: InstrumentId, mut rows: Vec<PricePoint>) {
        rows.sort_by_key(|row| row.date);
        self.series.insert(instrument, rows);
    }

    pub fn with_series(mut self, instrument: InstrumentId, rows: Vec<PricePoint>) -> Self {
        self.insert(instrument, rows);
        self
    }

    pub fn instruments(&self) -> impl Iterator<Item = &InstrumentId> {
        self.series.keys()
    }
}

impl MarketDataSource for InMemoryMarketDataSource {
    fn get_price_history(
        &self,
        instrument: &InstrumentId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, String> {
        Ok(self
            .series
            .get(instrument)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.date >= start && row.date <= end)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
