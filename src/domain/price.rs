//! Daily price bars and the derived series the signal evaluator reads.

use crate::domain::error::StrategistError;
use chrono::{Duration, NaiveDate};
use std::fmt;
use std::str::FromStr;

/// Calendar days of history fetched ahead of an evaluation window.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 365;

pub const SMA_SHORT_PERIOD: usize = 50;
pub const SMA_LONG_PERIOD: usize = 200;

/// One raw row as delivered by a [`crate::ports::price_port::PricePort`].
#[derive(Debug, Clone, PartialEq)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
}

/// A validated bar with its trailing moving averages.
///
/// `sma50`/`sma200` are `None` until enough bars precede the date.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub close: f64,
    pub sma50: Option<f64>,
    pub sma200: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PriceField {
    Open,
    Close,
    Sma50,
    Sma200,
}

impl PriceField {
    pub fn value(self, bar: &PriceBar) -> Option<f64> {
        match self {
            PriceField::Open => Some(bar.open),
            PriceField::Close => Some(bar.close),
            PriceField::Sma50 => bar.sma50,
            PriceField::Sma200 => bar.sma200,
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PriceField::Open => "Open",
            PriceField::Close => "Close",
            PriceField::Sma50 => "SMA50",
            PriceField::Sma200 => "SMA200",
        };
        f.write_str(name)
    }
}

impl FromStr for PriceField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(PriceField::Open),
            "close" => Ok(PriceField::Close),
            "sma50" | "50" => Ok(PriceField::Sma50),
            "sma200" | "200" => Ok(PriceField::Sma200),
            other => Err(format!("unknown price field '{}'", other)),
        }
    }
}

/// An ordered, validated price history for one ticker.
///
/// Built once per (ticker, range) request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    ticker: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    /// Validate raw bars and derive the moving averages.
    ///
    /// Dates must be strictly increasing and every close finite and positive,
    /// since the position state machine divides by yesterday's close.
    pub fn from_daily_bars(ticker: &str, daily: &[DailyBar]) -> Result<Self, StrategistError> {
        for (i, bar) in daily.iter().enumerate() {
            if !bar.close.is_finite() || bar.close <= 0.0 {
                return Err(StrategistError::InvalidPrice {
                    ticker: ticker.to_string(),
                    date: bar.date,
                    reason: format!("close must be positive and finite, got {}", bar.close),
                });
            }
            if !bar.open.is_finite() {
                return Err(StrategistError::InvalidPrice {
                    ticker: ticker.to_string(),
                    date: bar.date,
                    reason: format!("open must be finite, got {}", bar.open),
                });
            }
            if i > 0 && daily[i - 1].date >= bar.date {
                return Err(StrategistError::InvalidPrice {
                    ticker: ticker.to_string(),
                    date: bar.date,
                    reason: "dates must be strictly increasing".into(),
                });
            }
        }

        let closes: Vec<f64> = daily.iter().map(|b| b.close).collect();
        let sma50 = rolling_mean(&closes, SMA_SHORT_PERIOD);
        let sma200 = rolling_mean(&closes, SMA_LONG_PERIOD);

        let bars = daily
            .iter()
            .enumerate()
            .map(|(i, b)| PriceBar {
                date: b.date,
                open: b.open,
                close: b.close,
                sma50: sma50[i],
                sma200: sma200[i],
            })
            .collect();

        Ok(Self {
            ticker: ticker.to_string(),
            bars,
        })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Index range `[first, last]` of bars dated within `[start, end]`.
    pub fn window_indices(&self, start: NaiveDate, end: NaiveDate) -> Option<(usize, usize)> {
        let first = self.bars.partition_point(|b| b.date < start);
        let past_end = self.bars.partition_point(|b| b.date <= end);
        if first >= past_end {
            None
        } else {
            Some((first, past_end - 1))
        }
    }
}

/// `date` moved by `days` calendar days, `None` outside chrono's date range.
pub fn shift_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    Duration::try_days(days).and_then(|d| date.checked_add_signed(d))
}

/// Earliest date to request so that `lookback_days` of history precede `start`.
pub fn lookback_start(start: NaiveDate, lookback_days: i64) -> Result<NaiveDate, StrategistError> {
    lookback_days
        .checked_neg()
        .and_then(|back| shift_days(start, back))
        .ok_or_else(|| StrategistError::ConfigInvalid {
            section: "backtest".into(),
            key: "lookback_days".into(),
            reason: format!("{} days before {} is out of range", lookback_days, start),
        })
}

fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, v) in values.iter().enumerate() {
        sum += v;
        if i >= period {
            sum -= values[i - period];
        }
        if i + 1 >= period {
            out.push(Some(sum / period as f64));
        } else {
            out.push(None);
        }
    }
    out
}
