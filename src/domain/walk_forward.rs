//! Walk-forward model selection.
//!
//! For each rolling test window, every candidate template is tuned on a
//! training window and checked on the validation window right before the
//! test. The first candidate (in priority order) whose validation strategic
//! ROI beats buy-and-hold in magnitude is applied to the test window; if none
//! does, the window falls back to buy-and-hold.
//!
//! ```text
//! |------ train ------|-- validate --|-- test --|
//!                                    ^ test_start
//! ```
//!
//! By default training runs through the validation window up to
//! `test_start`; with `train_through_validation` off it stops where
//! validation begins.

use crate::domain::backtest::{run_backtest, RoiPair};
use crate::domain::error::StrategistError;
use crate::domain::optimizer::{optimize, ObjectiveKind, OptimizerConfig};
use crate::domain::price::{shift_days, PriceSeries};
use crate::domain::strategy::Strategy;
use crate::domain::tuning::{current_parameters, ParameterBound};
use chrono::NaiveDate;

pub const DEFAULT_TRAIN_DAYS: i64 = 365;
pub const DEFAULT_VALIDATE_DAYS: i64 = 60;
pub const DEFAULT_TEST_DAYS: i64 = 60;

#[derive(Debug, Clone, PartialEq)]
pub struct WalkForwardPolicy {
    pub train_days: i64,
    pub validate_days: i64,
    pub test_days: i64,
    /// Train on `[train_start, test_start]` rather than `[train_start, validate_start]`.
    pub train_through_validation: bool,
    pub optimizer: OptimizerConfig,
    pub objective: ObjectiveKind,
}

/// Dates bounding one walk-forward step ahead of its test window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepWindows {
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub validate_start: NaiveDate,
}

impl Default for WalkForwardPolicy {
    fn default() -> Self {
        WalkForwardPolicy {
            train_days: DEFAULT_TRAIN_DAYS,
            validate_days: DEFAULT_VALIDATE_DAYS,
            test_days: DEFAULT_TEST_DAYS,
            train_through_validation: true,
            optimizer: OptimizerConfig::default(),
            objective: ObjectiveKind::Roi,
        }
    }
}

impl WalkForwardPolicy {
    pub fn validate(&self) -> Result<(), StrategistError> {
        for (key, value) in [
            ("train_days", self.train_days),
            ("validate_days", self.validate_days),
            ("test_days", self.test_days),
        ] {
            if value <= 0 {
                return Err(StrategistError::ConfigInvalid {
                    section: "walk_forward".into(),
                    key: key.into(),
                    reason: format!("{} must be positive, got {}", key, value),
                });
            }
        }
        self.optimizer.validate()
    }

    /// First date a training window can touch for tests starting at
    /// `first_test_start`. Rule look-back comes on top of this.
    pub fn training_start(&self, first_test_start: NaiveDate) -> Result<NaiveDate, StrategistError> {
        self.step_windows(first_test_start).map(|w| w.train_start)
    }

    /// Training and validation bounds for the test window opening on `test_start`.
    pub fn step_windows(&self, test_start: NaiveDate) -> Result<StepWindows, StrategistError> {
        let out_of_range = |key: &str, days: i64| StrategistError::ConfigInvalid {
            section: "walk_forward".into(),
            key: key.into(),
            reason: format!("{} days before {} is out of range", days, test_start),
        };
        let validate_start = self
            .validate_days
            .checked_neg()
            .and_then(|back| shift_days(test_start, back))
            .ok_or_else(|| out_of_range("validate_days", self.validate_days))?;
        let train_start = self
            .train_days
            .checked_neg()
            .and_then(|back| shift_days(validate_start, back))
            .ok_or_else(|| out_of_range("train_days", self.train_days))?;
        Ok(StepWindows {
            train_start,
            train_end: if self.train_through_validation {
                test_start
            } else {
                validate_start
            },
            validate_start,
        })
    }

    /// Test windows `[start, start + test_days]` that end on or before
    /// `last_test_end`.
    pub fn test_windows(
        &self,
        first_test_start: NaiveDate,
        last_test_end: NaiveDate,
    ) -> Vec<(NaiveDate, NaiveDate)> {
        let mut windows = Vec::new();
        let mut start = first_test_start;
        while let Some(end) = shift_days(start, self.test_days) {
            if end > last_test_end {
                break;
            }
            windows.push((start, end));
            start = end;
        }
        windows
    }
}

/// A strategy template and the fields to tune on it. Empty `bounds` means
/// the template is validated as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub strategy: Strategy,
    pub bounds: Vec<ParameterBound>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CandidateAttempt {
    pub name: String,
    pub parameters: Vec<f64>,
    pub validation: RoiPair,
    pub accepted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalkForwardStep {
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
    /// Candidates tried, in priority order, up to and including the accepted one.
    pub attempts: Vec<CandidateAttempt>,
    /// Name of the applied strategy, `None` for the buy-and-hold fallback.
    pub chosen: Option<String>,
    pub parameters: Vec<f64>,
    pub test_simple_roi: f64,
    pub test_strategic_roi: Option<f64>,
    /// Strategic ROI when a candidate was applied, simple ROI otherwise.
    pub applied_roi: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalkForwardReport {
    pub steps: Vec<WalkForwardStep>,
    pub compounded_simple_roi: f64,
    pub compounded_applied_roi: f64,
}

impl WalkForwardReport {
    pub fn windows_with_strategy(&self) -> usize {
        self.steps.iter().filter(|s| s.chosen.is_some()).count()
    }
}

/// `|strategic| > |simple|`, strict.
pub fn passes_validation(roi: &RoiPair) -> bool {
    roi.strategic.abs() > roi.simple.abs()
}

pub fn run_walk_forward(
    candidates: &[Candidate],
    series: &PriceSeries,
    policy: &WalkForwardPolicy,
    first_test_start: NaiveDate,
    last_test_end: NaiveDate,
) -> Result<WalkForwardReport, StrategistError> {
    policy.validate()?;
    if candidates.is_empty() {
        return Err(StrategistError::ConfigInvalid {
            section: "walk_forward".into(),
            key: "strategies".into(),
            reason: "at least one candidate strategy is required".into(),
        });
    }

    let windows = policy.test_windows(first_test_start, last_test_end);
    if windows.is_empty() {
        return Err(StrategistError::DegenerateWindow {
            start: first_test_start,
            end: last_test_end,
            horizon_days: policy.test_days,
        });
    }

    let steps = windows
        .into_iter()
        .map(|(start, end)| run_step(candidates, series, policy, start, end))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(WalkForwardReport {
        compounded_simple_roi: steps.iter().map(|s| s.test_simple_roi).product(),
        compounded_applied_roi: steps.iter().map(|s| s.applied_roi).product(),
        steps,
    })
}

fn run_step(
    candidates: &[Candidate],
    series: &PriceSeries,
    policy: &WalkForwardPolicy,
    test_start: NaiveDate,
    test_end: NaiveDate,
) -> Result<WalkForwardStep, StrategistError> {
    let StepWindows {
        train_start,
        train_end,
        validate_start,
    } = policy.step_windows(test_start)?;

    let mut attempts = Vec::new();
    let mut accepted: Option<(Strategy, Vec<f64>)> = None;

    for candidate in candidates {
        let (strategy, parameters) = if candidate.bounds.is_empty() {
            (candidate.strategy.clone(), Vec::new())
        } else {
            let tuned = optimize(
                &candidate.strategy,
                &candidate.bounds,
                policy.objective,
                series,
                train_start,
                train_end,
                &policy.optimizer,
            )?;
            let parameters = current_parameters(&tuned.strategy, &candidate.bounds);
            (tuned.strategy, parameters)
        };

        let validation = run_backtest(&strategy, series, validate_start, test_start)?.roi();
        let ok = passes_validation(&validation);
        attempts.push(CandidateAttempt {
            name: strategy.name.clone(),
            parameters: parameters.clone(),
            validation,
            accepted: ok,
        });
        if ok {
            accepted = Some((strategy, parameters));
            break;
        }
    }

    match accepted {
        Some((strategy, parameters)) => {
            let test = run_backtest(&strategy, series, test_start, test_end)?.roi();
            Ok(WalkForwardStep {
                test_start,
                test_end,
                attempts,
                chosen: Some(strategy.name),
                parameters,
                test_simple_roi: test.simple,
                test_strategic_roi: Some(test.strategic),
                applied_roi: test.strategic,
            })
        }
        None => {
            let simple = buy_and_hold_roi(series, test_start, test_end)?;
            Ok(WalkForwardStep {
                test_start,
                test_end,
                attempts,
                chosen: None,
                parameters: Vec::new(),
                test_simple_roi: simple,
                test_strategic_roi: None,
                applied_roi: simple,
            })
        }
    }
}

/// Close-to-close ratio over the trading days in `[start, end]`.
pub fn buy_and_hold_roi(
    series: &PriceSeries,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<f64, StrategistError> {
    let (first, last) = series
        .window_indices(start, end)
        .ok_or_else(|| StrategistError::NoData {
            ticker: series.ticker().to_string(),
            start,
            end,
        })?;
    let bars = series.bars();
    Ok(bars[last].close / bars[first].close)
}
