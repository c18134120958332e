//! Strategy definition: weighted rules plus buy/sell thresholds.

use crate::domain::error::StrategistError;
use crate::domain::rule::Rule;

pub const DEFAULT_STARTING_CAPITAL: f64 = 1000.0;

/// Rule order does not affect evaluation since contributions are summed.
/// `buy_threshold >= sell_threshold` is expected but not enforced.
#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub name: String,
    pub ticker: String,
    pub rules: Vec<Rule>,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub starting_capital: f64,
}

impl Strategy {
    pub fn validate(&self) -> Result<(), StrategistError> {
        for (i, rule) in self.rules.iter().enumerate() {
            rule.validate(i)?;
        }
        Ok(())
    }

    /// Deepest look-back across all rules, in trading days.
    pub fn max_lookback(&self) -> usize {
        self.rules.iter().map(Rule::max_lookback).max().unwrap_or(0)
    }
}
