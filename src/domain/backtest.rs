//! Single-window backtest.
//!
//! Signal evaluation followed by the position state machine over
//! `[start, end]`. The result is a pure function of its inputs: calling it
//! twice yields identical traces.

use crate::domain::error::StrategistError;
use crate::domain::position::{run_positions, DailyEvaluation};
use crate::domain::price::{PriceBar, PriceSeries};
use crate::domain::signal::evaluate_signals;
use crate::domain::strategy::Strategy;
use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub ticker: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub starting_capital: f64,
    /// The trimmed series the trace was computed from, one bar per evaluation.
    pub prices: Vec<PriceBar>,
    pub evaluations: Vec<DailyEvaluation>,
}

/// Ratio of final to initial value over the whole window, for both curves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoiPair {
    pub simple: f64,
    pub strategic: f64,
}

impl BacktestResult {
    pub fn roi(&self) -> RoiPair {
        self.roi_between(0, self.evaluations.len() - 1)
    }

    /// ROI over the inclusive index range `[from, to]` of the trace.
    pub fn roi_between(&self, from: usize, to: usize) -> RoiPair {
        let a = &self.evaluations[from];
        let b = &self.evaluations[to];
        RoiPair {
            simple: b.simple_value / a.simple_value,
            strategic: b.strategic_value / a.strategic_value,
        }
    }

    pub fn first_date(&self) -> NaiveDate {
        self.evaluations[0].date
    }

    pub fn last_date(&self) -> NaiveDate {
        self.evaluations[self.evaluations.len() - 1].date
    }
}

/// Run `strategy` over the trading days of `series` within `[start, end]`.
///
/// `series` must already include enough history before `start` for the
/// deepest rule offset.
pub fn run_backtest(
    strategy: &Strategy,
    series: &PriceSeries,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<BacktestResult, StrategistError> {
    strategy.validate()?;
    if !strategy.starting_capital.is_finite() || strategy.starting_capital <= 0.0 {
        return Err(StrategistError::ConfigInvalid {
            section: "strategy".into(),
            key: "starting_capital".into(),
            reason: "starting_capital must be positive".into(),
        });
    }

    let signals = evaluate_signals(&strategy.rules, series, start, end)?;
    let evaluations = run_positions(
        &signals,
        strategy.buy_threshold,
        strategy.sell_threshold,
        strategy.starting_capital,
    );

    let prices = match series.window_indices(start, end) {
        Some((first, last)) => series.bars()[first..=last].to_vec(),
        None => Vec::new(),
    };

    Ok(BacktestResult {
        ticker: series.ticker().to_string(),
        start,
        end,
        starting_capital: strategy.starting_capital,
        prices,
        evaluations,
    })
}
