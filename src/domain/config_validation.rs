//! Configuration validation and strategy loading.
//!
//! Values are parsed strictly: a key that is present but does not parse is an
//! error, never a silent fallback to the default.

use crate::domain::error::StrategistError;
use crate::domain::optimizer::ObjectiveKind;
use crate::domain::price::PriceField;
use crate::domain::rule::Rule;
use crate::domain::strategy::{Strategy, DEFAULT_STARTING_CAPITAL};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;
use std::fmt::Display;
use std::str::FromStr;

pub const RULE_SECTION_PREFIX: &str = "rule.";

/// Which fields `optimize` tunes when no explicit bounds are given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuneMode {
    Percentage,
    Timing,
}

impl FromStr for TuneMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "percentage" | "percentages" => Ok(TuneMode::Percentage),
            "timing" => Ok(TuneMode::Timing),
            other => Err(format!("unknown tune mode '{}'", other)),
        }
    }
}

pub fn parse_required<T>(config: &dyn ConfigPort, section: &str, key: &str) -> Result<T, StrategistError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = config
        .get_string(section, key)
        .ok_or_else(|| StrategistError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })?;
    raw.trim().parse().map_err(|e: T::Err| StrategistError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: e.to_string(),
    })
}

pub fn parse_or<T>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: T,
) -> Result<T, StrategistError>
where
    T: FromStr,
    T::Err: Display,
{
    match config.get_string(section, key) {
        Some(_) => parse_required(config, section, key),
        None => Ok(default),
    }
}

pub fn parse_date(config: &dyn ConfigPort, section: &str, key: &str) -> Result<NaiveDate, StrategistError> {
    let raw = config
        .get_string(section, key)
        .ok_or_else(|| StrategistError::ConfigMissing {
            section: section.into(),
            key: key.into(),
        })?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| StrategistError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: "invalid date format (expected YYYY-MM-DD)".into(),
    })
}

pub fn validate_run_config(config: &dyn ConfigPort) -> Result<(), StrategistError> {
    validate_dates(config)?;
    validate_lookback(config)?;
    validate_realizations(config)?;
    validate_optimize(config)?;
    validate_walk_forward(config)?;
    Ok(())
}

pub fn validate_strategy_config(config: &dyn ConfigPort) -> Result<(), StrategistError> {
    load_strategy(config).map(|_| ())
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), StrategistError> {
    let start = parse_date(config, "backtest", "start_date")?;
    let end = parse_date(config, "backtest", "end_date")?;
    if start >= end {
        return Err(StrategistError::ConfigInvalid {
            section: "backtest".into(),
            key: "end_date".into(),
            reason: "end_date must be after start_date".into(),
        });
    }
    Ok(())
}

fn validate_lookback(config: &dyn ConfigPort) -> Result<(), StrategistError> {
    let lookback: i64 = parse_or(config, "backtest", "lookback_days", 365)?;
    if lookback < 0 {
        return Err(StrategistError::ConfigInvalid {
            section: "backtest".into(),
            key: "lookback_days".into(),
            reason: "lookback_days must be non-negative".into(),
        });
    }
    Ok(())
}

fn require_positive(config: &dyn ConfigPort, section: &str, key: &str, default: i64) -> Result<(), StrategistError> {
    let value: i64 = parse_or(config, section, key, default)?;
    if value <= 0 {
        return Err(StrategistError::ConfigInvalid {
            section: section.into(),
            key: key.into(),
            reason: format!("{} must be positive", key),
        });
    }
    Ok(())
}

fn validate_realizations(config: &dyn ConfigPort) -> Result<(), StrategistError> {
    require_positive(config, "realizations", "step_days", 30)?;
    require_positive(config, "realizations", "horizon_days", 365)
}

fn validate_optimize(config: &dyn ConfigPort) -> Result<(), StrategistError> {
    parse_or(config, "optimize", "objective", ObjectiveKind::Roi)?;
    parse_or(config, "optimize", "tune", TuneMode::Percentage)?;
    require_positive(config, "optimize", "n_calls", 50)?;
    require_positive(config, "optimize", "n_random_starts", 15)?;
    let n_calls: i64 = parse_or(config, "optimize", "n_calls", 50)?;
    let n_random: i64 = parse_or(config, "optimize", "n_random_starts", 15)?;
    if n_random > n_calls {
        return Err(StrategistError::ConfigInvalid {
            section: "optimize".into(),
            key: "n_random_starts".into(),
            reason: "n_random_starts must not exceed n_calls".into(),
        });
    }
    parse_or::<u64>(config, "optimize", "seed", 1234)?;
    if config.get_string("optimize", "max_seconds").is_some() {
        let secs: f64 = parse_required(config, "optimize", "max_seconds")?;
        if !secs.is_finite() || secs <= 0.0 {
            return Err(StrategistError::ConfigInvalid {
                section: "optimize".into(),
                key: "max_seconds".into(),
                reason: "max_seconds must be positive".into(),
            });
        }
    }
    Ok(())
}

fn validate_walk_forward(config: &dyn ConfigPort) -> Result<(), StrategistError> {
    require_positive(config, "walk_forward", "train_days", 365)?;
    require_positive(config, "walk_forward", "validate_days", 60)?;
    require_positive(config, "walk_forward", "test_days", 60)?;
    parse_or(config, "walk_forward", "train_through_validation", true)?;
    let first = config.get_string("walk_forward", "first_test_start");
    let last = config.get_string("walk_forward", "last_test_end");
    if first.is_some() && last.is_some() {
        let first = parse_date(config, "walk_forward", "first_test_start")?;
        let last = parse_date(config, "walk_forward", "last_test_end")?;
        if first >= last {
            return Err(StrategistError::ConfigInvalid {
                section: "walk_forward".into(),
                key: "last_test_end".into(),
                reason: "last_test_end must be after first_test_start".into(),
            });
        }
    }
    Ok(())
}

/// Build a [`Strategy`] from a strategy file.
///
/// Rules come from `[rule.N]` sections ordered by `N`. Any missing or
/// malformed rule key is [`StrategistError::InvalidRule`].
pub fn load_strategy(config: &dyn ConfigPort) -> Result<Strategy, StrategistError> {
    let ticker = config
        .get_string("strategy", "ticker")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| StrategistError::ConfigMissing {
            section: "strategy".into(),
            key: "ticker".into(),
        })?;
    let name = config
        .get_string("strategy", "name")
        .unwrap_or_else(|| ticker.clone());

    let strategy = Strategy {
        name,
        ticker,
        rules: load_rules(config)?,
        buy_threshold: parse_required(config, "strategy", "buy_threshold")?,
        sell_threshold: parse_required(config, "strategy", "sell_threshold")?,
        starting_capital: parse_or(config, "strategy", "starting_capital", DEFAULT_STARTING_CAPITAL)?,
    };

    if !strategy.starting_capital.is_finite() || strategy.starting_capital <= 0.0 {
        return Err(StrategistError::ConfigInvalid {
            section: "strategy".into(),
            key: "starting_capital".into(),
            reason: "starting_capital must be positive".into(),
        });
    }
    for (key, value) in [
        ("buy_threshold", strategy.buy_threshold),
        ("sell_threshold", strategy.sell_threshold),
    ] {
        if !value.is_finite() {
            return Err(StrategistError::ConfigInvalid {
                section: "strategy".into(),
                key: key.into(),
                reason: "threshold must be finite".into(),
            });
        }
    }
    strategy.validate()?;
    Ok(strategy)
}

/// `[rule.N]` sections sorted by `N`.
pub fn rule_sections(config: &dyn ConfigPort) -> Result<Vec<String>, StrategistError> {
    let mut numbered = Vec::new();
    for section in config.sections() {
        let Some(suffix) = section.strip_prefix(RULE_SECTION_PREFIX) else {
            continue;
        };
        let n: u32 = suffix.parse().map_err(|_| StrategistError::ConfigInvalid {
            section: section.clone(),
            key: String::new(),
            reason: "rule sections must be named rule.<number>".into(),
        })?;
        numbered.push((n, section));
    }
    numbered.sort();
    Ok(numbered.into_iter().map(|(_, s)| s).collect())
}

fn load_rules(config: &dyn ConfigPort) -> Result<Vec<Rule>, StrategistError> {
    rule_sections(config)?
        .iter()
        .enumerate()
        .map(|(index, section)| load_rule(config, index, section))
        .collect()
}

fn rule_value<T>(config: &dyn ConfigPort, index: usize, section: &str, key: &str) -> Result<T, StrategistError>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = config
        .get_string(section, key)
        .ok_or_else(|| StrategistError::InvalidRule {
            rule: index,
            reason: format!("[{}] is missing {}", section, key),
        })?;
    raw.trim().parse().map_err(|e: T::Err| StrategistError::InvalidRule {
        rule: index,
        reason: format!("[{}] {} = '{}': {}", section, key, raw.trim(), e),
    })
}

fn load_rule(config: &dyn ConfigPort, index: usize, section: &str) -> Result<Rule, StrategistError> {
    let rule = Rule {
        larger_field: rule_value::<PriceField>(config, index, section, "larger_field")?,
        larger_offset: rule_value(config, index, section, "larger_offset")?,
        smaller_field: rule_value::<PriceField>(config, index, section, "smaller_field")?,
        smaller_offset: rule_value(config, index, section, "smaller_offset")?,
        percentage: rule_value(config, index, section, "percentage")?,
        weight: rule_value(config, index, section, "weight")?,
    };
    rule.validate(index)?;
    Ok(rule)
}
