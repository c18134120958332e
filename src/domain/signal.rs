//! Signal evaluation.
//!
//! Turns a rule list into a per-day weighted score over an evaluation window.
//! The series handed in is the *extended* series: it carries a look-back
//! buffer before the window start so that negative offsets resolve to real
//! bars. Looking past the start of the buffer is an error, never a clamp.

use crate::domain::error::StrategistError;
use crate::domain::price::{PriceField, PriceSeries};
use crate::domain::rule::Rule;
use chrono::NaiveDate;

/// Score for one trading day of the window.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySignal {
    pub date: NaiveDate,
    pub close: f64,
    /// One entry per rule: `0.0` or the rule's weight.
    pub contributions: Vec<f64>,
    pub signal_sum: f64,
}

/// Evaluate `rules` for every trading day in `[start, end]`.
///
/// An empty rule list yields a zero score every day.
pub fn evaluate_signals(
    rules: &[Rule],
    series: &PriceSeries,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<DailySignal>, StrategistError> {
    let (first, last) =
        series
            .window_indices(start, end)
            .ok_or_else(|| StrategistError::NoData {
                ticker: series.ticker().to_string(),
                start,
                end,
            })?;

    // `first` is the alignment between the extended series and the window:
    // extended[first + i] is window day i.
    let bars = series.bars();
    let mut out = Vec::with_capacity(last - first + 1);

    for idx in first..=last {
        let mut contributions = Vec::with_capacity(rules.len());
        for (r, rule) in rules.iter().enumerate() {
            let larger = lookup(series, idx, rule.larger_offset, rule.larger_field, r)?;
            let smaller = lookup(series, idx, rule.smaller_offset, rule.smaller_field, r)?;
            contributions.push(if rule.fires(larger, smaller) {
                rule.weight
            } else {
                0.0
            });
        }
        let signal_sum = contributions.iter().sum();
        out.push(DailySignal {
            date: bars[idx].date,
            close: bars[idx].close,
            contributions,
            signal_sum,
        });
    }

    Ok(out)
}

fn lookup(
    series: &PriceSeries,
    idx: usize,
    offset: i32,
    field: PriceField,
    rule: usize,
) -> Result<f64, StrategistError> {
    let bars = series.bars();
    let target = idx as i64 + offset as i64;
    if target < 0 || target as usize >= bars.len() {
        return Err(StrategistError::DataInsufficient {
            ticker: series.ticker().to_string(),
            reason: format!(
                "rule {} looks back {} days from {} but history starts at {}",
                rule,
                -offset,
                bars[idx].date,
                bars[0].date
            ),
        });
    }
    let bar = &bars[target as usize];
    field
        .value(bar)
        .ok_or_else(|| StrategistError::DataInsufficient {
            ticker: series.ticker().to_string(),
            reason: format!("rule {} needs {} on {}, which is not yet defined", rule, field, bar.date),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price::DailyBar;
    use chrono::Duration;

    fn series_from_closes(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2022, 1, 1).unwrap();
        let bars: Vec<DailyBar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| DailyBar {
                date: start + Duration::days(i as i64),
                open: c,
                close: c,
            })
            .collect();
        PriceSeries::from_daily_bars("TEST", &bars).unwrap()
    }

    fn day(n: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, 1).unwrap() + Duration::days(n)
    }

    fn one_day_drop(pct: f64, weight: f64) -> Rule {
        Rule {
            larger_offset: -1,
            larger_field: PriceField::Close,
            smaller_offset: 0,
            smaller_field: PriceField::Close,
            percentage: pct,
            weight,
        }
    }

    #[test]
    fn empty_rules_score_zero() {
        let series = series_from_closes(&[10.0, 11.0, 12.0]);
        let signals = evaluate_signals(&[], &series, day(0), day(2)).unwrap();
        assert_eq!(signals.len(), 3);
        assert!(signals.iter().all(|s| s.signal_sum == 0.0));
        assert!(signals.iter().all(|s| s.contributions.is_empty()));
    }

    #[test]
    fn offsets_read_from_lookback_buffer() {
        // Window starts at day 1; day 1 compares against day 0 in the buffer.
        let series = series_from_closes(&[100.0, 90.0, 95.0]);
        let rule = one_day_drop(5.0, -1.0);
        let signals = evaluate_signals(&[rule], &series, day(1), day(2)).unwrap();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].signal_sum, -1.0);
        assert_eq!(signals[1].signal_sum, 0.0);
    }

    #[test]
    fn contributions_sum_across_rules() {
        let series = series_from_closes(&[100.0, 80.0]);
        let rules = vec![one_day_drop(1.0, -1.0), one_day_drop(2.0, -0.5)];
        let signals = evaluate_signals(&rules, &series, day(1), day(1)).unwrap();
        assert_eq!(signals[0].contributions, vec![-1.0, -0.5]);
        assert_eq!(signals[0].signal_sum, -1.5);
    }

    #[test]
    fn insufficient_history_is_an_error() {
        let series = series_from_closes(&[100.0, 90.0, 95.0]);
        let rule = one_day_drop(5.0, -1.0);
        let err = evaluate_signals(&[rule], &series, day(0), day(2)).unwrap_err();
        assert!(matches!(err, StrategistError::DataInsufficient { .. }));
    }

    #[test]
    fn undefined_sma_is_an_error() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let series = series_from_closes(&closes);
        let rule = Rule {
            larger_offset: 0,
            larger_field: PriceField::Close,
            smaller_offset: 0,
            smaller_field: PriceField::Sma200,
            percentage: 0.0,
            weight: 1.0,
        };
        let err = evaluate_signals(&[rule], &series, day(10), day(20)).unwrap_err();
        assert!(matches!(err, StrategistError::DataInsufficient { .. }));
    }

    #[test]
    fn empty_window_is_no_data() {
        let series = series_from_closes(&[100.0, 101.0]);
        let err = evaluate_signals(&[], &series, day(10), day(20)).unwrap_err();
        assert!(matches!(err, StrategistError::NoData { .. }));
    }
}
