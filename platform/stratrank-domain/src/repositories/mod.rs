pub mod market_data;
pub mod result_sink;
