#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use std::collections::HashMap;
use strategist::domain::error::StrategistError;
pub use strategist::domain::price::{DailyBar, PriceField, PriceSeries};
use strategist::domain::rule::Rule;
use strategist::domain::strategy::Strategy;
use strategist::ports::price_port::PricePort;

pub struct MockPricePort {
    pub data: HashMap<String, Vec<DailyBar>>,
    pub errors: HashMap<String, String>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<DailyBar>) -> Self {
        self.data.insert(ticker.to_string(), bars);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }
}

impl PricePort for MockPricePort {
    fn fetch_prices(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<DailyBar>, StrategistError> {
        if let Some(reason) = self.errors.get(ticker) {
            return Err(StrategistError::DataSource {
                reason: reason.clone(),
            });
        }
        let bars: Vec<DailyBar> = self
            .data
            .get(ticker)
            .map(|bars| {
                bars.iter()
                    .filter(|b| b.date >= start_date && b.date <= end_date)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if bars.is_empty() {
            return Err(StrategistError::NoData {
                ticker: ticker.to_string(),
                start: start_date,
                end: end_date,
            });
        }
        Ok(bars)
    }

    fn get_data_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, StrategistError> {
        match self.data.get(ticker) {
            Some(bars) if !bars.is_empty() => {
                let min = bars.iter().map(|b| b.date).min().unwrap();
                let max = bars.iter().map(|b| b.date).max().unwrap();
                Ok(Some((min, max, bars.len())))
            }
            _ => Ok(None),
        }
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// One bar per calendar day starting at `start`, open equal to close.
pub fn daily_bars(start: NaiveDate, closes: &[f64]) -> Vec<DailyBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| DailyBar {
            date: start + Duration::days(i as i64),
            open: close,
            close,
        })
        .collect()
}

pub fn series(ticker: &str, start: NaiveDate, closes: &[f64]) -> PriceSeries {
    PriceSeries::from_daily_bars(ticker, &daily_bars(start, closes)).unwrap()
}

/// Closes compounding by `ratio` each day.
pub fn geometric_closes(first: f64, ratio: f64, len: usize) -> Vec<f64> {
    (0..len).map(|i| first * ratio.powi(i as i32)).collect()
}

/// `Close[larger_offset] > Close[0] * (1 + percentage / 100)`, i.e. the close
/// fell by more than `percentage` since `-larger_offset` days ago.
pub fn drop_rule(larger_offset: i32, percentage: f64, weight: f64) -> Rule {
    Rule {
        larger_offset,
        larger_field: PriceField::Close,
        smaller_offset: 0,
        smaller_field: PriceField::Close,
        percentage,
        weight,
    }
}

pub fn strategy(ticker: &str, rules: Vec<Rule>, buy: f64, sell: f64) -> Strategy {
    Strategy {
        name: format!("{} test", ticker),
        ticker: ticker.to_string(),
        rules,
        buy_threshold: buy,
        sell_threshold: sell,
        starting_capital: 1000.0,
    }
}
