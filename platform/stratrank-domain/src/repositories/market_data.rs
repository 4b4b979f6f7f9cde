use crate::value_objects::instrument::InstrumentId;
use crate::value_objects::price_point::PricePoint;
use chrono::NaiveDate;

/// Read-only daily price history for one instrument.
///
/// Rows come back in ascending date order and only cover `[start, end]`.
/// An empty vector means the instrument has no data in the window.
pub trait MarketDataSource {
    fn get_price_history(
        &self,
        instrument: &InstrumentId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, String>;
}
