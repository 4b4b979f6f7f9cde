pub mod market_data;
pub mod sinks;
