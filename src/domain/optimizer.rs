//! Budget-limited Bayesian search over a strategy's tunable fields.
//!
//! The search minimizes. An initial batch of seeded random points is
//! evaluated (in parallel, collected in order), then each further point is
//! the expected-improvement maximizer of a Gaussian-process surrogate fitted
//! to every evaluation so far. The surrogate step is strictly sequential.
//!
//! There is no optimality guarantee. Running out of calls or wall-clock time
//! is a normal outcome reported through [`Termination`].

use crate::domain::backtest::run_backtest;
use crate::domain::error::StrategistError;
use crate::domain::price::PriceSeries;
use crate::domain::realization::{score_realizations, RealizationConfig};
use crate::domain::strategy::Strategy;
use crate::domain::surrogate::GaussianProcess;
use crate::domain::tuning::{apply_parameters, validate_bounds, ParameterBound, SearchDomain};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use statrs::distribution::{Continuous, ContinuousCDF, Normal};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

pub const DEFAULT_N_CALLS: usize = 50;
pub const DEFAULT_N_RANDOM_STARTS: usize = 15;
pub const DEFAULT_SEED: u64 = 1234;

/// Exploration margin for expected improvement.
pub const EI_XI: f64 = 0.01;

const RANDOM_CANDIDATES: usize = 2000;
const LOCAL_CANDIDATES: usize = 200;
/// Half-width, in unit-cube coordinates, of the incumbent neighbourhood.
const LOCAL_RADIUS: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveKind {
    /// Minimize `-strategic_roi` over the whole window.
    Roi,
    /// Minimize `-score` of the realization scan.
    Realizations,
}

impl fmt::Display for ObjectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ObjectiveKind::Roi => "roi",
            ObjectiveKind::Realizations => "realizations",
        })
    }
}

impl FromStr for ObjectiveKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "roi" => Ok(ObjectiveKind::Roi),
            "realizations" | "realization" => Ok(ObjectiveKind::Realizations),
            other => Err(format!("unknown objective '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerConfig {
    pub n_calls: usize,
    pub n_random_starts: usize,
    pub seed: u64,
    /// Wall-clock cap. Checked between rayon-sized chunks of the random batch,
    /// after the first chunk, and before each surrogate-guided evaluation.
    pub deadline: Option<Duration>,
    /// Used by [`ObjectiveKind::Realizations`].
    pub realization: RealizationConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        OptimizerConfig {
            n_calls: DEFAULT_N_CALLS,
            n_random_starts: DEFAULT_N_RANDOM_STARTS,
            seed: DEFAULT_SEED,
            deadline: None,
            realization: RealizationConfig::default(),
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<(), StrategistError> {
        if self.n_calls == 0 {
            return Err(StrategistError::ConfigInvalid {
                section: "optimize".into(),
                key: "n_calls".into(),
                reason: "n_calls must be at least 1".into(),
            });
        }
        if self.n_random_starts == 0 || self.n_random_starts > self.n_calls {
            return Err(StrategistError::ConfigInvalid {
                section: "optimize".into(),
                key: "n_random_starts".into(),
                reason: format!(
                    "n_random_starts must be between 1 and n_calls ({}), got {}",
                    self.n_calls, self.n_random_starts
                ),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// All `n_calls` evaluations were spent.
    BudgetExhausted,
    /// The deadline passed before the budget was spent.
    DeadlineReached,
    /// Every proposal had already been evaluated; the domain is too small
    /// to spend the rest of the budget on.
    SpaceExhausted,
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Termination::BudgetExhausted => "budget exhausted",
            Termination::DeadlineReached => "deadline reached",
            Termination::SpaceExhausted => "search space exhausted",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub parameters: Vec<f64>,
    pub objective: f64,
}

/// Raw outcome of [`minimize`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOutcome {
    pub parameters: Vec<f64>,
    pub objective: f64,
    /// In evaluation order.
    pub history: Vec<Evaluation>,
    pub termination: Termination,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    pub parameters: Vec<f64>,
    /// Best (lowest) objective value, i.e. the negated ROI or score.
    pub objective: f64,
    pub evaluations: usize,
    pub history: Vec<Evaluation>,
    pub termination: Termination,
    /// The template rewritten with `parameters`.
    pub strategy: Strategy,
}

/// Objective value of one concrete strategy.
pub fn evaluate_objective(
    strategy: &Strategy,
    kind: ObjectiveKind,
    series: &PriceSeries,
    start: NaiveDate,
    end: NaiveDate,
    realization: &RealizationConfig,
) -> Result<f64, StrategistError> {
    match kind {
        ObjectiveKind::Roi => {
            let result = run_backtest(strategy, series, start, end)?;
            Ok(-result.roi().strategic)
        }
        ObjectiveKind::Realizations => {
            let report = score_realizations(strategy, series, start, end, realization)?;
            Ok(-report.score)
        }
    }
}

/// Tune `template`'s bounded fields over `[start, end]`.
pub fn optimize(
    template: &Strategy,
    bounds: &[ParameterBound],
    kind: ObjectiveKind,
    series: &PriceSeries,
    start: NaiveDate,
    end: NaiveDate,
    config: &OptimizerConfig,
) -> Result<OptimizationResult, StrategistError> {
    validate_bounds(template, bounds)?;
    let domains: Vec<SearchDomain> = bounds.iter().map(|b| b.domain.clone()).collect();

    let objective = |params: &[f64]| -> Result<f64, StrategistError> {
        let strategy = apply_parameters(template, bounds, params)?;
        evaluate_objective(&strategy, kind, series, start, end, &config.realization)
    };

    let outcome = minimize(&domains, objective, config)?;
    let strategy = apply_parameters(template, bounds, &outcome.parameters)?;

    Ok(OptimizationResult {
        evaluations: outcome.history.len(),
        parameters: outcome.parameters,
        objective: outcome.objective,
        history: outcome.history,
        termination: outcome.termination,
        strategy,
    })
}

/// Minimize `objective` over the product of `domains`.
///
/// The first failing evaluation aborts the search. For a fixed seed the
/// sequence of evaluated points is reproducible regardless of thread count.
pub fn minimize<F>(
    domains: &[SearchDomain],
    objective: F,
    config: &OptimizerConfig,
) -> Result<SearchOutcome, StrategistError>
where
    F: Fn(&[f64]) -> Result<f64, StrategistError> + Sync,
{
    config.validate()?;
    if domains.is_empty() {
        return Err(StrategistError::ConfigInvalid {
            section: "optimize".into(),
            key: "bounds".into(),
            reason: "at least one tunable parameter is required".into(),
        });
    }

    let started = Instant::now();
    let normal = Normal::new(0.0, 1.0).map_err(|e| StrategistError::Optimizer {
        reason: e.to_string(),
    })?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let initial: Vec<Vec<f64>> = (0..config.n_random_starts)
        .map(|_| sample_point(domains, &mut rng))
        .collect();
    let deadline_passed = || config.deadline.is_some_and(|d| started.elapsed() >= d);

    let mut termination = Termination::BudgetExhausted;
    let mut history: Vec<Evaluation> = Vec::with_capacity(config.n_calls);
    for chunk in initial.chunks(rayon::current_num_threads().max(1)) {
        if !history.is_empty() && deadline_passed() {
            termination = Termination::DeadlineReached;
            break;
        }
        let values = chunk
            .par_iter()
            .map(|p| objective(p))
            .collect::<Result<Vec<_>, _>>()?;
        history.extend(chunk.iter().cloned().zip(values).map(|(parameters, objective)| {
            Evaluation {
                parameters,
                objective,
            }
        }));
    }

    while termination == Termination::BudgetExhausted && history.len() < config.n_calls {
        if deadline_passed() {
            termination = Termination::DeadlineReached;
            break;
        }
        let Some(next) = propose(domains, &history, &normal, &mut rng) else {
            termination = Termination::SpaceExhausted;
            break;
        };
        let value = objective(&next)?;
        history.push(Evaluation {
            parameters: next,
            objective: value,
        });
    }

    let best = best_index(&history).ok_or_else(|| StrategistError::Optimizer {
        reason: "no finite objective value was produced".into(),
    })?;

    Ok(SearchOutcome {
        parameters: history[best].parameters.clone(),
        objective: history[best].objective,
        history,
        termination,
    })
}

fn sample_point<R: Rng + ?Sized>(domains: &[SearchDomain], rng: &mut R) -> Vec<f64> {
    domains.iter().map(|d| d.sample(rng)).collect()
}

/// Lowest finite objective; earliest wins ties.
fn best_index(history: &[Evaluation]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (i, e) in history.iter().enumerate() {
        if !e.objective.is_finite() {
            continue;
        }
        if best.is_none_or(|b| e.objective < history[b].objective) {
            best = Some(i);
        }
    }
    best
}

fn to_unit(domains: &[SearchDomain], params: &[f64]) -> Vec<f64> {
    domains
        .iter()
        .zip(params)
        .map(|(d, &x)| d.to_unit(x))
        .collect()
}

fn expected_improvement(mean: f64, std: f64, best: f64, normal: &Normal) -> f64 {
    let improvement = best - mean - EI_XI;
    if std <= 0.0 {
        return improvement.max(0.0);
    }
    let z = improvement / std;
    improvement * normal.cdf(z) + std * normal.pdf(z)
}

/// Next point to evaluate, or `None` when nothing new can be proposed.
fn propose(
    domains: &[SearchDomain],
    history: &[Evaluation],
    normal: &Normal,
    rng: &mut StdRng,
) -> Option<Vec<f64>> {
    let finite: Vec<&Evaluation> = history.iter().filter(|e| e.objective.is_finite()).collect();
    let inputs: Vec<Vec<f64>> = finite
        .iter()
        .map(|e| to_unit(domains, &e.parameters))
        .collect();
    let targets: Vec<f64> = finite.iter().map(|e| e.objective).collect();

    let mut candidates: Vec<Vec<f64>> = (0..RANDOM_CANDIDATES)
        .map(|_| sample_point(domains, rng))
        .collect();
    if let Some(best) = best_index(history) {
        let incumbent = to_unit(domains, &history[best].parameters);
        for _ in 0..LOCAL_CANDIDATES {
            candidates.push(
                domains
                    .iter()
                    .zip(&incumbent)
                    .map(|(d, &u)| d.from_unit(u + rng.gen_range(-LOCAL_RADIUS..=LOCAL_RADIUS)))
                    .collect(),
            );
        }
    }
    candidates.retain(|c| !history.iter().any(|e| &e.parameters == c));
    if candidates.is_empty() {
        return None;
    }

    let Some(gp) = GaussianProcess::fit(&inputs, &targets) else {
        return candidates.into_iter().next();
    };
    let best_target = targets.iter().copied().fold(f64::INFINITY, f64::min);

    let mut chosen = 0;
    let mut chosen_ei = f64::NEG_INFINITY;
    for (i, c) in candidates.iter().enumerate() {
        let (mean, std) = gp.predict(&to_unit(domains, c));
        let ei = expected_improvement(mean, std, best_target, normal);
        if ei > chosen_ei {
            chosen = i;
            chosen_ei = ei;
        }
    }
    Some(candidates.swap_remove(chosen))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quadratic(params: &[f64]) -> Result<f64, StrategistError> {
        Ok((params[0] - 0.3).powi(2) + (params[1] - 2.0).powi(2))
    }

    fn domains() -> Vec<SearchDomain> {
        vec![
            SearchDomain::Continuous {
                low: -1.0,
                high: 1.0,
            },
            SearchDomain::Integer { low: -5, high: 5 },
        ]
    }

    #[test]
    fn objective_kind_parses() {
        assert_eq!("ROI".parse::<ObjectiveKind>().unwrap(), ObjectiveKind::Roi);
        assert_eq!(
            "realizations".parse::<ObjectiveKind>().unwrap(),
            ObjectiveKind::Realizations
        );
        assert!("sharpe".parse::<ObjectiveKind>().is_err());
    }

    #[test]
    fn config_rejects_more_random_starts_than_calls() {
        let config = OptimizerConfig {
            n_calls: 10,
            n_random_starts: 11,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        let zero = OptimizerConfig {
            n_calls: 0,
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn spends_full_budget_and_finds_quadratic_minimum() {
        let outcome = minimize(&domains(), quadratic, &OptimizerConfig::default()).unwrap();
        assert_eq!(outcome.history.len(), DEFAULT_N_CALLS);
        assert_eq!(outcome.termination, Termination::BudgetExhausted);
        assert_eq!(outcome.parameters[1], 2.0);
        assert!((outcome.parameters[0] - 0.3).abs() < 0.15);
    }

    #[test]
    fn every_point_respects_its_domain() {
        let outcome = minimize(&domains(), quadratic, &OptimizerConfig::default()).unwrap();
        for e in &outcome.history {
            assert!((-1.0..=1.0).contains(&e.parameters[0]));
            assert!((-5.0..=5.0).contains(&e.parameters[1]));
            assert_eq!(e.parameters[1].fract(), 0.0);
        }
    }

    #[test]
    fn same_seed_same_history() {
        let config = OptimizerConfig {
            n_calls: 20,
            n_random_starts: 5,
            ..Default::default()
        };
        let a = minimize(&domains(), quadratic, &config).unwrap();
        let b = minimize(&domains(), quadratic, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn best_is_minimum_of_history() {
        let outcome = minimize(&domains(), quadratic, &OptimizerConfig::default()).unwrap();
        let min = outcome
            .history
            .iter()
            .map(|e| e.objective)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(outcome.objective, min);
    }

    #[test]
    fn zero_deadline_stops_inside_random_batch() {
        let config = OptimizerConfig {
            deadline: Some(Duration::ZERO),
            ..Default::default()
        };
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let outcome = pool.install(|| minimize(&domains(), quadratic, &config)).unwrap();
        assert_eq!(outcome.termination, Termination::DeadlineReached);
        assert_eq!(outcome.history.len(), 2);
    }

    #[test]
    fn zero_deadline_keeps_seeded_points() {
        let config = OptimizerConfig {
            deadline: Some(Duration::ZERO),
            ..Default::default()
        };
        let full = minimize(&domains(), quadratic, &OptimizerConfig::default()).unwrap();
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let cut = pool.install(|| minimize(&domains(), quadratic, &config)).unwrap();
        assert_eq!(cut.history.len(), 1);
        assert_eq!(cut.history[0].parameters, full.history[0].parameters);
    }

    #[test]
    fn tiny_domain_stops_when_exhausted() {
        let domains = vec![SearchDomain::Choices(vec![1.0, 2.0, 3.0])];
        let config = OptimizerConfig {
            n_calls: 10,
            n_random_starts: 2,
            ..Default::default()
        };
        let outcome = minimize(&domains, |p| Ok((p[0] - 2.0).abs()), &config).unwrap();
        assert_eq!(outcome.termination, Termination::SpaceExhausted);
        assert!(outcome.history.len() <= 4);
        assert_eq!(outcome.parameters, vec![2.0]);
    }

    #[test]
    fn objective_errors_propagate() {
        let failing = |_: &[f64]| -> Result<f64, StrategistError> {
            Err(StrategistError::DataInsufficient {
                ticker: "SPY".into(),
                reason: "x".into(),
            })
        };
        let err = minimize(&domains(), failing, &OptimizerConfig::default()).unwrap_err();
        assert!(matches!(err, StrategistError::DataInsufficient { .. }));
    }

    #[test]
    fn expected_improvement_prefers_low_mean_and_high_std() {
        let normal = Normal::new(0.0, 1.0).unwrap();
        let low = expected_improvement(-1.0, 0.1, 0.0, &normal);
        let high = expected_improvement(1.0, 0.1, 0.0, &normal);
        assert!(low > high);
        let wide = expected_improvement(1.0, 2.0, 0.0, &normal);
        assert!(wide > high);
        assert_eq!(expected_improvement(1.0, 0.0, 0.0, &normal), 0.0);
    }
}
