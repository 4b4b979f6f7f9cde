use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;
use stratrank_domain::repositories::market_data::MarketDataSource;
use stratrank_domain::value_objects::instrument::InstrumentId;
use stratrank_domain::value_objects::price_point::PricePoint;

#[derive(Debug, Deserialize)]
struct DailyRecord {
    date: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Daily bars read from `<dir>/<instrument>.csv` (header `date,open,high,low,close,volume`).
///
/// A missing file means "no data" rather than an error. Rows are sorted by date and
/// later duplicates of a date replace earlier ones.
#[derive(Debug, Clone)]
pub struct CsvMarketDataSource {
    dir: PathBuf,
}

impl CsvMarketDataSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, instrument: &InstrumentId) -> PathBuf {
        self.dir.join(format!("{}.csv", instrument.as_str()))
    }
}

fn record_read_metrics<T>(start: Instant, result: &Result<T, String>) {
    let result_label = if result.is_ok() { "ok" } else { "err" };
    metrics::counter!(
        "stratrank.infra.market_data.read.calls_total",
        "kind" => "csv",
        "result" => result_label
    )
    .increment(1);
    metrics::histogram!(
        "stratrank.infra.market_data.read_ms",
        "kind" => "csv",
        "result" => result_label
    )
    .record(start.elapsed().as_millis() as f64);
}

impl MarketDataSource for CsvMarketDataSource {
    fn get_price_history(
        &self,
        instrument: &InstrumentId,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, String> {
        let started = Instant::now();
        let path = self.path_for(instrument);
        if !path.exists() {
            tracing::warn!(
                instrument = %instrument,
                path = %path.display(),
                "price file not found"
            );
            let result = Ok(Vec::new());
            record_read_metrics(started, &result);
            return result;
        }
        let result = load_daily_csv(&path, instrument, start, end);
        record_read_metrics(started, &result);
        result
    }
}

fn load_daily_csv(
    path: &Path,
    instrument: &InstrumentId,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<PricePoint>, String> {
    let file = File::open(path)
        .map_err(|err| format!("failed to open price CSV {}: {}", path.display(), err))?;
    let mut reader = csv::Reader::from_reader(file);

    let mut by_date: BTreeMap<NaiveDate, PricePoint> = BTreeMap::new();
    let mut duplicates = 0usize;
    for result in reader.deserialize::<DailyRecord>() {
        let record = result
            .map_err(|err| format!("failed to parse CSV row in {}: {}", path.display(), err))?;
        let date = NaiveDate::parse_from_str(record.date.trim(), "%Y-%m-%d").map_err(|err| {
            format!(
                "invalid date '{}' in {}: {}",
                record.date,
                path.display(),
                err
            )
        })?;
        if date < start || date > end {
            continue;
        }
        let point = PricePoint {
            instrument: instrument.clone(),
            date,
            open: record.open,
            high: record.high,
            low: record.low,
            close: record.close,
            volume: record.volume,
        };
        if by_date.insert(date, point).is_some() {
            duplicates += 1;
        }
    }
    if duplicates > 0 {
        tracing::warn!(instrument = %instrument, duplicates, "duplicate dates in price file");
    }

    Ok(by_date.into_values().collect())
}
