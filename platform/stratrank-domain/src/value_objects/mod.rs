pub mod instrument;
pub mod price_point;
pub mod side;
pub mod signal;
pub mod snapshot;
pub mod trade;
