//! Pure engine: signal evaluation, the position state machine, scoring and
//! optimization. Nothing in here performs I/O or logging.

pub mod backtest;
pub mod config_validation;
pub mod error;
pub mod metrics;
pub mod optimizer;
pub mod position;
pub mod price;
pub mod realization;
pub mod rule;
pub mod signal;
pub mod strategy;
pub mod surrogate;
pub mod tuning;
pub mod walk_forward;
