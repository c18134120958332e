//! Summary statistics for a backtest trace.

use crate::domain::backtest::BacktestResult;
use crate::domain::position::{Action, Disposition};
use statrs::statistics::Statistics;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Drawdown and volatility for one value curve.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveStats {
    pub roi: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    pub annualized_volatility: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestSummary {
    pub trading_days: usize,
    pub simple: CurveStats,
    pub strategic: CurveStats,
    /// Buy labels after day one.
    pub buys: usize,
    pub sells: usize,
    pub invested_fraction: f64,
}

impl BacktestSummary {
    pub fn compute(result: &BacktestResult) -> Self {
        let evals = &result.evaluations;
        let simple: Vec<f64> = evals.iter().map(|e| e.simple_value).collect();
        let strategic: Vec<f64> = evals.iter().map(|e| e.strategic_value).collect();

        let buys = evals
            .iter()
            .skip(1)
            .filter(|e| e.recorded_decision == Action::Buy)
            .count();
        let sells = evals
            .iter()
            .skip(1)
            .filter(|e| e.recorded_decision == Action::Sell)
            .count();
        let invested = evals
            .iter()
            .filter(|e| e.disposition == Disposition::Invested)
            .count();

        BacktestSummary {
            trading_days: evals.len(),
            simple: curve_stats(&simple),
            strategic: curve_stats(&strategic),
            buys,
            sells,
            invested_fraction: if evals.is_empty() {
                0.0
            } else {
                invested as f64 / evals.len() as f64
            },
        }
    }
}

fn curve_stats(values: &[f64]) -> CurveStats {
    let roi = match (values.first(), values.last()) {
        (Some(&a), Some(&b)) if a > 0.0 => b / a,
        _ => 1.0,
    };
    let (max_drawdown, max_drawdown_duration) = compute_drawdown(values);
    CurveStats {
        roi,
        max_drawdown,
        max_drawdown_duration,
        annualized_volatility: annualized_volatility(values),
    }
}

fn compute_drawdown(values: &[f64]) -> (f64, usize) {
    let Some(&first) = values.first() else {
        return (0.0, 0);
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0usize;
    let mut current_duration = 0usize;

    for &v in values {
        if v >= peak {
            peak = v;
            current_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - v) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
            current_duration += 1;
            if current_duration > max_duration {
                max_duration = current_duration;
            }
        }
    }

    (max_dd, max_duration)
}

fn annualized_volatility(values: &[f64]) -> f64 {
    if values.len() < 3 {
        return 0.0;
    }
    let returns: Vec<f64> = values.windows(2).map(|w| w[1] / w[0] - 1.0).collect();
    let sd = returns.iter().std_dev();
    if sd.is_finite() {
        sd * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}
