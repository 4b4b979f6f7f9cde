mod csv_dir;
mod memory;

pub use csv_dir::CsvMarketDataSource;
pub use memory::InMemoryMarketDataSource;
