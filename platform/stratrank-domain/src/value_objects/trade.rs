use crate::value_objects::instrument::InstrumentId;
use crate::value_objects::side::Side;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub instrument: InstrumentId,
    pub date: NaiveDate,
    pub side: Side,
    pub price: f64,
    pub quantity: u64,
    pub amount: f64,
    pub cash_after: f64,
}
