//! Position state machine.
//!
//! Consumes the daily signal score and produces a sticky Invested/Cash trace
//! with two value curves: `simple_value` always holds the ticker, while
//! `strategic_value` only compounds on days the strategy is invested.
//!
//! The trace is a fold over [`PositionState`]: each day depends only on the
//! previous day's state, today's score and today's close ratio.

use crate::domain::signal::DailySignal;
use chrono::NaiveDate;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Buy => "Buy",
            Action::Sell => "Sell",
            Action::Hold => "Hold",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    Invested,
    Cash,
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Disposition::Invested => "Invested",
            Disposition::Cash => "Cash",
        })
    }
}

/// One row of the decision trace.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyEvaluation {
    pub date: NaiveDate,
    pub close: f64,
    pub signal_sum: f64,
    /// What the thresholds say today, ignoring history.
    pub raw_action: Action,
    pub disposition: Disposition,
    /// Transition label: `Hold` unless the position changed today.
    pub recorded_decision: Action,
    pub simple_value: f64,
    pub strategic_value: f64,
}

/// `> buy` is Buy, `< sell` is Sell, anything else (including equality) Hold.
pub fn raw_action(signal_sum: f64, buy_threshold: f64, sell_threshold: f64) -> Action {
    if signal_sum > buy_threshold {
        Action::Buy
    } else if signal_sum < sell_threshold {
        Action::Sell
    } else {
        Action::Hold
    }
}

/// State carried from one day to the next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionState {
    pub disposition: Disposition,
    pub recorded_decision: Action,
    pub close: f64,
    pub simple_value: f64,
    pub strategic_value: f64,
}

impl PositionState {
    /// Day one. A neutral score starts invested: the strategy enters the
    /// market unless told to stay out.
    pub fn initial(raw: Action, close: f64, starting_capital: f64) -> Self {
        let (disposition, recorded_decision) = match raw {
            Action::Sell => (Disposition::Cash, Action::Sell),
            Action::Buy | Action::Hold => (Disposition::Invested, Action::Buy),
        };
        Self {
            disposition,
            recorded_decision,
            close,
            simple_value: starting_capital,
            strategic_value: starting_capital,
        }
    }

    /// Advance one trading day.
    ///
    /// Yesterday's decision decides whether today's move is captured: a Buy
    /// (or a Hold while invested) compounds, a Sell (or a Hold in cash) stays
    /// flat. Only a raw action opposite to that position changes state.
    pub fn step(&self, raw: Action, close: f64) -> Self {
        let ratio = close / self.close;
        let invested = match self.recorded_decision {
            Action::Buy => true,
            Action::Sell => false,
            Action::Hold => self.disposition == Disposition::Invested,
        };

        let (disposition, strategic_value, reinforcing) = if invested {
            (Disposition::Invested, self.strategic_value * ratio, Action::Buy)
        } else {
            (Disposition::Cash, self.strategic_value, Action::Sell)
        };

        let recorded_decision = if raw == reinforcing { Action::Hold } else { raw };

        Self {
            disposition,
            recorded_decision,
            close,
            simple_value: self.simple_value * ratio,
            strategic_value,
        }
    }
}

/// Run the state machine over an evaluated signal window.
///
/// Closes are assumed positive; [`crate::domain::price::PriceSeries`] rejects
/// anything else before it gets here.
pub fn run_positions(
    signals: &[DailySignal],
    buy_threshold: f64,
    sell_threshold: f64,
    starting_capital: f64,
) -> Vec<DailyEvaluation> {
    let mut trace = Vec::with_capacity(signals.len());
    let mut state: Option<PositionState> = None;

    for signal in signals {
        let raw = raw_action(signal.signal_sum, buy_threshold, sell_threshold);
        let next = match state {
            None => PositionState::initial(raw, signal.close, starting_capital),
            Some(prev) => prev.step(raw, signal.close),
        };
        trace.push(DailyEvaluation {
            date: signal.date,
            close: signal.close,
            signal_sum: signal.signal_sum,
            raw_action: raw,
            disposition: next.disposition,
            recorded_decision: next.recorded_decision,
            simple_value: next.simple_value,
            strategic_value: next.strategic_value,
        });
        state = Some(next);
    }

    trace
}
