//! Realization scan: how often the strategy beat buy-and-hold over sliding
//! forward windows.
//!
//! The decision trace is evaluated once over the whole range; each sample
//! reads ROIs off a slice of that trace instead of re-running the state
//! machine.

use crate::domain::backtest::{run_backtest, BacktestResult};
use crate::domain::error::StrategistError;
use crate::domain::price::{shift_days, PriceSeries};
use crate::domain::strategy::Strategy;
use chrono::NaiveDate;
use std::fmt;

pub const DEFAULT_STEP_DAYS: i64 = 30;
pub const DEFAULT_HORIZON_DAYS: i64 = 365;

/// Scores below this are poor.
pub const MARGINAL_SCORE_FLOOR: f64 = 0.5;
/// Scores at or above this are good.
pub const GOOD_SCORE_FLOOR: f64 = 0.75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RealizationConfig {
    pub step_days: i64,
    pub horizon_days: i64,
}

impl Default for RealizationConfig {
    fn default() -> Self {
        RealizationConfig {
            step_days: DEFAULT_STEP_DAYS,
            horizon_days: DEFAULT_HORIZON_DAYS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RealizationSample {
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub simple_roi: f64,
    pub strategic_roi: f64,
}

impl RealizationSample {
    pub fn strategic_wins(&self) -> bool {
        self.strategic_roi > self.simple_roi
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreGrade {
    Poor,
    Marginal,
    Good,
}

impl ScoreGrade {
    pub fn from_score(score: f64) -> Self {
        if score < MARGINAL_SCORE_FLOOR {
            ScoreGrade::Poor
        } else if score < GOOD_SCORE_FLOOR {
            ScoreGrade::Marginal
        } else {
            ScoreGrade::Good
        }
    }
}

impl fmt::Display for ScoreGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScoreGrade::Poor => "poor",
            ScoreGrade::Marginal => "marginal",
            ScoreGrade::Good => "good",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RealizationReport {
    pub samples: Vec<RealizationSample>,
    pub strategic_wins: usize,
    pub total: usize,
    /// `strategic_wins / total`, always within `[0, 1]`.
    pub score: f64,
}

impl RealizationReport {
    pub fn grade(&self) -> ScoreGrade {
        ScoreGrade::from_score(self.score)
    }
}

/// Backtest `[start, end]` once, then scan it for realizations.
pub fn score_realizations(
    strategy: &Strategy,
    series: &PriceSeries,
    start: NaiveDate,
    end: NaiveDate,
    config: &RealizationConfig,
) -> Result<RealizationReport, StrategistError> {
    let result = run_backtest(strategy, series, start, end)?;
    scan_realizations(&result, config)
}

/// Sample forward windows out of an existing trace.
///
/// Candidate starts are trading days at least `step_days` after the previous
/// sample, beginning with the first day of the trace. A candidate is sampled
/// when its whole `horizon_days` window ends on or before the requested
/// `end`, which may itself be a non-trading day. The window's closing ROI is
/// read on the last trading day on or before its end.
/// On a gap-free daily series spanning `span` days this yields
/// `floor((span - horizon) / step) + 1` samples.
pub fn scan_realizations(
    result: &BacktestResult,
    config: &RealizationConfig,
) -> Result<RealizationReport, StrategistError> {
    if config.step_days <= 0 || config.horizon_days <= 0 {
        return Err(StrategistError::ConfigInvalid {
            section: "realizations".into(),
            key: "step_days".into(),
            reason: "step_days and horizon_days must be positive".into(),
        });
    }

    let trace = &result.evaluations;
    let mut samples = Vec::new();
    let mut next_candidate = result.first_date();

    for (i, eval) in trace.iter().enumerate() {
        if eval.date < next_candidate {
            continue;
        }
        let Some(window_end) = shift_days(eval.date, config.horizon_days) else {
            break;
        };
        if window_end > result.end {
            break;
        }
        // Last trading day on or before the window end.
        let j = i + trace[i..].partition_point(|e| e.date <= window_end) - 1;
        let roi = result.roi_between(i, j);
        samples.push(RealizationSample {
            window_start: eval.date,
            window_end,
            simple_roi: roi.simple,
            strategic_roi: roi.strategic,
        });
        match shift_days(eval.date, config.step_days) {
            Some(next) => next_candidate = next,
            None => break,
        }
    }

    let total = samples.len();
    if total == 0 {
        return Err(StrategistError::DegenerateWindow {
            start: result.first_date(),
            end: result.end,
            horizon_days: config.horizon_days,
        });
    }
    let strategic_wins = samples.iter().filter(|s| s.strategic_wins()).count();

    Ok(RealizationReport {
        samples,
        strategic_wins,
        total,
        score: strategic_wins as f64 / total as f64,
    })
}
