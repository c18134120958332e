//! Command-line front end.
//!
//! Loads INI run/strategy files, fetches prices from the CSV directory and
//! prints results to stdout. Progress and diagnostics go through `log`.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use crate::adapters::csv_adapter::CsvPriceAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::backtest::{run_backtest, BacktestResult};
use crate::domain::config_validation::{
    load_strategy, parse_date, parse_or, parse_required, validate_run_config,
    validate_strategy_config, TuneMode,
};
use crate::domain::error::StrategistError;
use crate::domain::metrics::BacktestSummary;
use crate::domain::optimizer::{
    evaluate_objective, optimize, ObjectiveKind, OptimizationResult, OptimizerConfig,
    DEFAULT_N_CALLS, DEFAULT_N_RANDOM_STARTS, DEFAULT_SEED,
};
use crate::domain::price::DEFAULT_LOOKBACK_DAYS;
use crate::domain::realization::{
    scan_realizations, RealizationConfig, RealizationReport, DEFAULT_HORIZON_DAYS,
    DEFAULT_STEP_DAYS,
};
use crate::domain::strategy::Strategy;
use crate::domain::tuning::{default_percentage_bounds, default_timing_bounds, ParameterBound};
use crate::domain::walk_forward::{
    run_walk_forward, Candidate, WalkForwardPolicy, WalkForwardReport, DEFAULT_TEST_DAYS,
    DEFAULT_TRAIN_DAYS, DEFAULT_VALIDATE_DAYS,
};
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PricePort;

#[derive(Parser, Debug)]
#[command(name = "strategist", about = "Rule-based signal backtester and strategy tuner")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Backtest a strategy over the configured window
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: PathBuf,
        /// Print the day-by-day decision trace
        #[arg(long)]
        trace: bool,
    },
    /// Score how often the strategy beat buy-and-hold over rolling windows
    Realizations {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: PathBuf,
    },
    /// Tune a strategy's rule parameters
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategy: PathBuf,
    },
    /// Walk-forward selection across candidate strategies, in priority order
    WalkForward {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short = 's', long = "strategy", required = true)]
        strategies: Vec<PathBuf>,
    },
    /// Validate a strategy file
    Validate {
        #[arg(short, long)]
        strategy: PathBuf,
    },
    /// Show the available data range for a ticker
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: String,
    },
}

/// Dates, data location and look-back from a run file's `[backtest]` section.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub data_dir: PathBuf,
    pub lookback_days: i64,
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            config,
            strategy,
            trace,
        } => run_backtest_command(&config, &strategy, trace),
        Command::Realizations { config, strategy } => run_realizations_command(&config, &strategy),
        Command::Optimize { config, strategy } => run_optimize_command(&config, &strategy),
        Command::WalkForward { config, strategies } => {
            run_walk_forward_command(&config, &strategies)
        }
        Command::Validate { strategy } => run_validate(&strategy),
        Command::Info { config, ticker } => run_info(&config, &ticker),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::from(&e)
        }
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, StrategistError> {
    FileConfigAdapter::from_file(path).map_err(|e| StrategistError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

pub fn load_strategy_file(path: &Path) -> Result<Strategy, StrategistError> {
    info!("Loading strategy from {}", path.display());
    let adapter = load_config(path)?;
    load_strategy(&adapter)
}

fn load_run_file(path: &Path) -> Result<(FileConfigAdapter, RunConfig), StrategistError> {
    info!("Loading config from {}", path.display());
    let adapter = load_config(path)?;
    validate_run_config(&adapter)?;
    let run_config = build_run_config(&adapter)?;
    Ok((adapter, run_config))
}

pub fn build_run_config(adapter: &dyn ConfigPort) -> Result<RunConfig, StrategistError> {
    Ok(RunConfig {
        start_date: parse_date(adapter, "backtest", "start_date")?,
        end_date: parse_date(adapter, "backtest", "end_date")?,
        data_dir: PathBuf::from(
            adapter
                .get_string("backtest", "data_dir")
                .unwrap_or_else(|| "data".to_string()),
        ),
        lookback_days: parse_or(adapter, "backtest", "lookback_days", DEFAULT_LOOKBACK_DAYS)?,
    })
}

pub fn build_realization_config(adapter: &dyn ConfigPort) -> Result<RealizationConfig, StrategistError> {
    Ok(RealizationConfig {
        step_days: parse_or(adapter, "realizations", "step_days", DEFAULT_STEP_DAYS)?,
        horizon_days: parse_or(adapter, "realizations", "horizon_days", DEFAULT_HORIZON_DAYS)?,
    })
}

pub fn build_optimizer_config(adapter: &dyn ConfigPort) -> Result<OptimizerConfig, StrategistError> {
    let deadline = match adapter.get_string("optimize", "max_seconds") {
        Some(_) => {
            let secs: f64 = parse_required(adapter, "optimize", "max_seconds")?;
            let d = Duration::try_from_secs_f64(secs).map_err(|e| StrategistError::ConfigInvalid {
                section: "optimize".into(),
                key: "max_seconds".into(),
                reason: e.to_string(),
            })?;
            Some(d)
        }
        None => None,
    };

    let config = OptimizerConfig {
        n_calls: parse_or(adapter, "optimize", "n_calls", DEFAULT_N_CALLS)?,
        n_random_starts: parse_or(adapter, "optimize", "n_random_starts", DEFAULT_N_RANDOM_STARTS)?,
        seed: parse_or(adapter, "optimize", "seed", DEFAULT_SEED)?,
        deadline,
        realization: build_realization_config(adapter)?,
    };
    config.validate()?;
    Ok(config)
}

pub fn build_objective(adapter: &dyn ConfigPort) -> Result<ObjectiveKind, StrategistError> {
    parse_or(adapter, "optimize", "objective", ObjectiveKind::Roi)
}

pub fn build_tune_mode(adapter: &dyn ConfigPort) -> Result<TuneMode, StrategistError> {
    parse_or(adapter, "optimize", "tune", TuneMode::Percentage)
}

/// Policy plus the first test start and last test end. The test range
/// defaults to the `[backtest]` window.
pub fn build_walk_forward(
    adapter: &dyn ConfigPort,
    run_config: &RunConfig,
) -> Result<(WalkForwardPolicy, NaiveDate, NaiveDate), StrategistError> {
    let policy = WalkForwardPolicy {
        train_days: parse_or(adapter, "walk_forward", "train_days", DEFAULT_TRAIN_DAYS)?,
        validate_days: parse_or(adapter, "walk_forward", "validate_days", DEFAULT_VALIDATE_DAYS)?,
        test_days: parse_or(adapter, "walk_forward", "test_days", DEFAULT_TEST_DAYS)?,
        train_through_validation: parse_or(adapter, "walk_forward", "train_through_validation", true)?,
        optimizer: build_optimizer_config(adapter)?,
        objective: build_objective(adapter)?,
    };
    let first = match adapter.get_string("walk_forward", "first_test_start") {
        Some(_) => parse_date(adapter, "walk_forward", "first_test_start")?,
        None => run_config.start_date,
    };
    let last = match adapter.get_string("walk_forward", "last_test_end") {
        Some(_) => parse_date(adapter, "walk_forward", "last_test_end")?,
        None => run_config.end_date,
    };
    Ok((policy, first, last))
}

pub fn tuning_bounds(strategy: &Strategy, mode: TuneMode) -> Vec<ParameterBound> {
    match mode {
        TuneMode::Percentage => default_percentage_bounds(strategy),
        TuneMode::Timing => default_timing_bounds(strategy),
    }
}

fn run_backtest_command(config_path: &Path, strategy_path: &Path, trace: bool) -> Result<(), StrategistError> {
    let (_, run_config) = load_run_file(config_path)?;
    let strategy = load_strategy_file(strategy_path)?;

    let port = CsvPriceAdapter::new(run_config.data_dir.clone());
    let series = port.fetch_series(
        &strategy.ticker,
        run_config.start_date,
        run_config.end_date,
        run_config.lookback_days,
    )?;

    info!(
        "Running backtest: {} on {}, {} to {}",
        strategy.name, strategy.ticker, run_config.start_date, run_config.end_date
    );
    let result = run_backtest(&strategy, &series, run_config.start_date, run_config.end_date)?;

    print_summary(&strategy, &result);
    if trace {
        print_trace(&result);
    }
    Ok(())
}

fn run_realizations_command(config_path: &Path, strategy_path: &Path) -> Result<(), StrategistError> {
    let (adapter, run_config) = load_run_file(config_path)?;
    let realization = build_realization_config(&adapter)?;
    let strategy = load_strategy_file(strategy_path)?;

    let port = CsvPriceAdapter::new(run_config.data_dir.clone());
    let series = port.fetch_series(
        &strategy.ticker,
        run_config.start_date,
        run_config.end_date,
        run_config.lookback_days,
    )?;

    info!(
        "Scanning realizations: {} every {} days over {}-day horizons",
        strategy.name, realization.step_days, realization.horizon_days
    );
    let result = run_backtest(&strategy, &series, run_config.start_date, run_config.end_date)?;
    let report = scan_realizations(&result, &realization)?;

    print_realizations(&strategy, &report);
    Ok(())
}

fn run_optimize_command(config_path: &Path, strategy_path: &Path) -> Result<(), StrategistError> {
    let (adapter, run_config) = load_run_file(config_path)?;
    let optimizer = build_optimizer_config(&adapter)?;
    let objective = build_objective(&adapter)?;
    let mode = build_tune_mode(&adapter)?;
    let template = load_strategy_file(strategy_path)?;
    let bounds = tuning_bounds(&template, mode);

    let port = CsvPriceAdapter::new(run_config.data_dir.clone());
    let series = port.fetch_series(
        &template.ticker,
        run_config.start_date,
        run_config.end_date,
        run_config.lookback_days,
    )?;

    let baseline = evaluate_objective(
        &template,
        objective,
        &series,
        run_config.start_date,
        run_config.end_date,
        &optimizer.realization,
    )?;
    info!(
        "Optimizing {} parameters of {} ({}, {} calls, seed {})",
        bounds.len(),
        template.name,
        objective,
        optimizer.n_calls,
        optimizer.seed
    );
    let result = optimize(
        &template,
        &bounds,
        objective,
        &series,
        run_config.start_date,
        run_config.end_date,
        &optimizer,
    )?;

    print_optimization(&template, &bounds, baseline, &result);
    Ok(())
}

fn run_walk_forward_command(config_path: &Path, strategy_paths: &[PathBuf]) -> Result<(), StrategistError> {
    let (adapter, run_config) = load_run_file(config_path)?;
    let (policy, first_test_start, last_test_end) = build_walk_forward(&adapter, &run_config)?;
    let mode = build_tune_mode(&adapter)?;

    let mut candidates = Vec::with_capacity(strategy_paths.len());
    for path in strategy_paths {
        let strategy = load_strategy_file(path)?;
        let bounds = tuning_bounds(&strategy, mode);
        candidates.push(Candidate { strategy, bounds });
    }

    let ticker = match candidates.first() {
        Some(c) => c.strategy.ticker.clone(),
        None => {
            return Err(StrategistError::ConfigMissing {
                section: "walk_forward".into(),
                key: "strategy".into(),
            })
        }
    };
    if let Some(other) = candidates.iter().find(|c| c.strategy.ticker != ticker) {
        return Err(StrategistError::ConfigInvalid {
            section: "strategy".into(),
            key: "ticker".into(),
            reason: format!(
                "all candidates must trade the same ticker ({} vs {})",
                ticker, other.strategy.ticker
            ),
        });
    }

    let port = CsvPriceAdapter::new(run_config.data_dir.clone());
    let series = port.fetch_series(
        &ticker,
        policy.training_start(first_test_start)?,
        last_test_end,
        run_config.lookback_days,
    )?;

    info!(
        "Walk-forward on {}: {} candidates, tests of {} days from {} to {}",
        ticker,
        candidates.len(),
        policy.test_days,
        first_test_start,
        last_test_end
    );
    let report = run_walk_forward(&candidates, &series, &policy, first_test_start, last_test_end)?;

    print_walk_forward(&ticker, &report);
    Ok(())
}

fn run_validate(strategy_path: &Path) -> Result<(), StrategistError> {
    info!("Validating strategy: {}", strategy_path.display());
    let adapter = load_config(strategy_path)?;
    validate_strategy_config(&adapter)?;
    let strategy = load_strategy(&adapter)?;

    println!("Strategy:  {} ({})", strategy.name, strategy.ticker);
    println!(
        "Thresholds: buy > {}, sell < {}",
        strategy.buy_threshold, strategy.sell_threshold
    );
    println!("Capital:   {}", strategy.starting_capital);
    if strategy.rules.is_empty() {
        println!("Rules:     none (always invested unless thresholds say otherwise)");
    }
    for (i, rule) in strategy.rules.iter().enumerate() {
        println!("  [{}] {}", i, rule);
    }
    println!("Look-back: {} trading days", strategy.max_lookback());
    println!("\nStrategy configuration is valid.");
    Ok(())
}

fn run_info(config_path: &Path, ticker: &str) -> Result<(), StrategistError> {
    let adapter = load_config(config_path)?;
    let data_dir = adapter
        .get_string("backtest", "data_dir")
        .unwrap_or_else(|| "data".to_string());
    let port = CsvPriceAdapter::new(PathBuf::from(data_dir));

    match port.get_data_range(ticker)? {
        Some((first, last, count)) => {
            println!("{}: {} bars, {} to {}", ticker, count, first, last);
        }
        None => println!("{}: no data found", ticker),
    }
    Ok(())
}

fn print_summary(strategy: &Strategy, result: &BacktestResult) {
    let summary = BacktestSummary::compute(result);
    println!("=== {} ({}) ===", strategy.name, result.ticker);
    println!(
        "Window:            {} to {} ({} trading days)",
        result.first_date(),
        result.last_date(),
        summary.trading_days
    );
    println!("Buy & Hold ROI:    {:.4}", summary.simple.roi);
    println!("Strategy ROI:      {:.4}", summary.strategic.roi);
    println!(
        "Max Drawdown:      -{:.1}% (hold) / -{:.1}% (strategy)",
        summary.simple.max_drawdown * 100.0,
        summary.strategic.max_drawdown * 100.0
    );
    println!(
        "Volatility (ann.): {:.1}% (hold) / {:.1}% (strategy)",
        summary.simple.annualized_volatility * 100.0,
        summary.strategic.annualized_volatility * 100.0
    );
    println!(
        "Transitions:       {} buys, {} sells",
        summary.buys, summary.sells
    );
    println!(
        "Invested:          {:.1}% of days",
        summary.invested_fraction * 100.0
    );
}

fn print_trace(result: &BacktestResult) {
    println!("\ndate,close,signal_sum,raw_action,disposition,decision,simple_value,strategic_value");
    for e in &result.evaluations {
        println!(
            "{},{:.4},{},{},{},{},{:.4},{:.4}",
            e.date,
            e.close,
            e.signal_sum,
            e.raw_action,
            e.disposition,
            e.recorded_decision,
            e.simple_value,
            e.strategic_value
        );
    }
}

fn print_realizations(strategy: &Strategy, report: &RealizationReport) {
    println!("=== Realizations: {} ({}) ===", strategy.name, strategy.ticker);
    println!("{:<12} {:<12} {:>10} {:>10}", "start", "end", "hold", "strategy");
    for s in &report.samples {
        println!(
            "{:<12} {:<12} {:>10.4} {:>10.4}{}",
            s.window_start,
            s.window_end,
            s.simple_roi,
            s.strategic_roi,
            if s.strategic_wins() { "  *" } else { "" }
        );
    }
    println!(
        "\nScore: {}/{} = {:.3} ({})",
        report.strategic_wins,
        report.total,
        report.score,
        report.grade()
    );
}

fn print_optimization(
    template: &Strategy,
    bounds: &[ParameterBound],
    baseline: f64,
    result: &OptimizationResult,
) {
    println!("=== Optimization: {} ({}) ===", template.name, template.ticker);
    for (bound, value) in bounds.iter().zip(&result.parameters) {
        println!(
            "  {:<24} {:>10.4}   [{}, {}]",
            bound.field.to_string(),
            value,
            bound.domain.low(),
            bound.domain.high()
        );
    }
    println!("Template objective: {:.4}", baseline);
    println!("Best objective:     {:.4}", result.objective);
    println!(
        "Evaluations:        {} ({})",
        result.evaluations, result.termination
    );
    println!("\nTuned rules:");
    for (i, rule) in result.strategy.rules.iter().enumerate() {
        println!("  [{}] {}", i, rule);
    }
}

fn print_walk_forward(ticker: &str, report: &WalkForwardReport) {
    println!("=== Walk-forward: {} ===", ticker);
    println!(
        "{:<12} {:<12} {:<20} {:>10} {:>10}",
        "test start", "test end", "strategy", "hold", "applied"
    );
    for step in &report.steps {
        println!(
            "{:<12} {:<12} {:<20} {:>10.4} {:>10.4}",
            step.test_start,
            step.test_end,
            step.chosen.as_deref().unwrap_or("None"),
            step.test_simple_roi,
            step.applied_roi
        );
        if !step.parameters.is_empty() {
            let params: Vec<String> = step.parameters.iter().map(|p| format!("{:.3}", p)).collect();
            println!("{:<25} parameters: {}", "", params.join(", "));
        }
    }
    println!(
        "\nCompounded: hold {:.4}, applied {:.4} ({} of {} windows used a strategy)",
        report.compounded_simple_roi,
        report.compounded_applied_roi,
        report.windows_with_strategy(),
        report.steps.len()
    );
}
