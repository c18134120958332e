//! Price data port trait.

use crate::domain::error::StrategistError;
use crate::domain::price::{lookback_start, DailyBar, PriceSeries};
use chrono::NaiveDate;

pub trait PricePort {
    /// Daily bars for `ticker` dated within `[start_date, end_date]`, in date
    /// order. An unknown ticker or an empty range is
    /// [`StrategistError::NoData`], never an empty vector.
    fn fetch_prices(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DailyBar>, StrategistError>;

    /// First date, last date and bar count of everything available.
    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, StrategistError>;

    /// Fetch `[start_date - lookback_days, end_date]` and build the series
    /// the engine evaluates.
    fn fetch_series(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
        lookback_days: i64,
    ) -> Result<PriceSeries, StrategistError> {
        let bars = self.fetch_prices(ticker, lookback_start(start_date, lookback_days)?, end_date)?;
        PriceSeries::from_daily_bars(ticker, &bars)
    }
}
