//! CSV file price adapter.
//!
//! One file per ticker, `<data_dir>/<TICKER>.csv`, with a header row. Columns
//! are located by name so exports with extra columns (High, Low, Adj Close,
//! Volume) load unchanged.

use crate::domain::error::StrategistError;
use crate::domain::price::DailyBar;
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use log::{debug, warn};
use std::fs;
use std::path::PathBuf;

pub struct CsvPriceAdapter {
    base_path: PathBuf,
}

struct Columns {
    date: usize,
    open: usize,
    close: usize,
}

impl CsvPriceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker))
    }

    fn locate_columns(headers: &csv::StringRecord) -> Result<Columns, StrategistError> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| StrategistError::DataSource {
                    reason: format!("missing {} column", name),
                })
        };
        Ok(Columns {
            date: find("date")?,
            open: find("open")?,
            close: find("close")?,
        })
    }

    /// Every parseable row in the file, sorted by date. `None` when the
    /// file does not exist.
    fn read_all(&self, ticker: &str) -> Result<Option<Vec<DailyBar>>, StrategistError> {
        let path = self.csv_path(ticker);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("no price file for {} at {}", ticker, path.display());
                return Ok(None);
            }
            Err(e) => {
                return Err(StrategistError::DataSource {
                    reason: format!("failed to read {}: {}", path.display(), e),
                })
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| StrategistError::DataSource {
            reason: format!("CSV header error in {}: {}", path.display(), e),
        })?;
        let cols = Self::locate_columns(headers)?;

        let mut bars = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| StrategistError::DataSource {
                reason: format!("CSV parse error: {}", e),
            })?;

            let field = |idx: usize, name: &str| {
                record.get(idx).map(str::trim).ok_or_else(|| StrategistError::DataSource {
                    reason: format!("missing {} value", name),
                })
            };

            let date_str = field(cols.date, "date")?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                StrategistError::DataSource {
                    reason: format!("invalid date '{}': {}", date_str, e),
                }
            })?;

            let open_str = field(cols.open, "open")?;
            let close_str = field(cols.close, "close")?;
            // Exports mark holidays and halted days with "null".
            if open_str.eq_ignore_ascii_case("null") || close_str.eq_ignore_ascii_case("null") {
                debug!("skipping null row for {} on {}", ticker, date);
                continue;
            }

            let open: f64 = open_str.parse().map_err(|e| StrategistError::DataSource {
                reason: format!("invalid open value '{}' on {}: {}", open_str, date, e),
            })?;
            let close: f64 = close_str.parse().map_err(|e| StrategistError::DataSource {
                reason: format!("invalid close value '{}' on {}: {}", close_str, date, e),
            })?;

            bars.push(DailyBar { date, open, close });
        }

        bars.sort_by_key(|b| b.date);
        Ok(Some(bars))
    }
}

impl PricePort for CsvPriceAdapter {
    fn fetch_prices(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DailyBar>, StrategistError> {
        let no_data = || StrategistError::NoData {
            ticker: ticker.to_string(),
            start: start_date,
            end: end_date,
        };

        let bars: Vec<DailyBar> = self
            .read_all(ticker)?
            .ok_or_else(no_data)?
            .into_iter()
            .filter(|b| b.date >= start_date && b.date <= end_date)
            .collect();

        if bars.is_empty() {
            return Err(no_data());
        }
        debug!(
            "loaded {} bars for {} between {} and {}",
            bars.len(),
            ticker,
            start_date,
            end_date
        );
        Ok(bars)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, StrategistError> {
        let Some(bars) = self.read_all(ticker)? else {
            return Ok(None);
        };
        match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => Ok(Some((first.date, last.date, bars.len()))),
            _ => Ok(None),
        }
    }
}
