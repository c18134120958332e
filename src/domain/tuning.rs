//! Tunable rule parameters and their search domains.
//!
//! A parameter vector is always paired with a list of [`ParameterBound`]s of
//! the same length; position `i` of the vector sets the field named by bound
//! `i`. Applying a vector never touches the template, it returns a new
//! strategy.

use crate::domain::error::StrategistError;
use crate::domain::strategy::Strategy;
use rand::Rng;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Percentage,
    LargerOffset,
    SmallerOffset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TunableField {
    pub rule: usize,
    pub kind: FieldKind,
}

impl fmt::Display for TunableField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            FieldKind::Percentage => "percentage",
            FieldKind::LargerOffset => "larger_offset",
            FieldKind::SmallerOffset => "smaller_offset",
        };
        write!(f, "rule.{}.{}", self.rule, kind)
    }
}

/// Where a single parameter may be searched.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchDomain {
    /// Inclusive real interval.
    Continuous { low: f64, high: f64 },
    /// Inclusive integer interval.
    Integer { low: i64, high: i64 },
    /// A fixed set of allowed values.
    Choices(Vec<f64>),
}

impl SearchDomain {
    pub fn low(&self) -> f64 {
        match self {
            SearchDomain::Continuous { low, .. } => *low,
            SearchDomain::Integer { low, .. } => *low as f64,
            SearchDomain::Choices(values) => values.iter().copied().fold(f64::INFINITY, f64::min),
        }
    }

    pub fn high(&self) -> f64 {
        match self {
            SearchDomain::Continuous { high, .. } => *high,
            SearchDomain::Integer { high, .. } => *high as f64,
            SearchDomain::Choices(values) => {
                values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
            }
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        match self {
            SearchDomain::Continuous { low, high } => {
                if !low.is_finite() || !high.is_finite() || low > high {
                    return Err(format!("invalid interval [{}, {}]", low, high));
                }
            }
            SearchDomain::Integer { low, high } => {
                if low > high {
                    return Err(format!("invalid integer interval [{}, {}]", low, high));
                }
            }
            SearchDomain::Choices(values) => {
                if values.is_empty() {
                    return Err("empty choice list".into());
                }
                if values.iter().any(|v| !v.is_finite()) {
                    return Err("choices must be finite".into());
                }
            }
        }
        Ok(())
    }

    /// Move `x` to the nearest legal value.
    pub fn snap(&self, x: f64) -> f64 {
        match self {
            SearchDomain::Continuous { low, high } => x.clamp(*low, *high),
            SearchDomain::Integer { low, high } => x.round().clamp(*low as f64, *high as f64),
            SearchDomain::Choices(values) => values
                .iter()
                .copied()
                .min_by(|a, b| {
                    (a - x)
                        .abs()
                        .partial_cmp(&(b - x).abs())
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .unwrap_or(x),
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            SearchDomain::Continuous { low, high } => {
                if low == high {
                    *low
                } else {
                    rng.gen_range(*low..=*high)
                }
            }
            SearchDomain::Integer { low, high } => rng.gen_range(*low..=*high) as f64,
            SearchDomain::Choices(values) => values[rng.gen_range(0..values.len())],
        }
    }

    /// Map into `[0, 1]` for the surrogate model.
    pub fn to_unit(&self, x: f64) -> f64 {
        let (lo, hi) = (self.low(), self.high());
        if hi > lo { (x - lo) / (hi - lo) } else { 0.5 }
    }

    pub fn from_unit(&self, u: f64) -> f64 {
        let (lo, hi) = (self.low(), self.high());
        self.snap(lo + u.clamp(0.0, 1.0) * (hi - lo))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBound {
    pub field: TunableField,
    pub domain: SearchDomain,
}

/// Check a bounds list against the template it will be applied to.
pub fn validate_bounds(template: &Strategy, bounds: &[ParameterBound]) -> Result<(), StrategistError> {
    if bounds.is_empty() {
        return Err(StrategistError::ConfigInvalid {
            section: "optimize".into(),
            key: "bounds".into(),
            reason: "at least one tunable parameter is required".into(),
        });
    }
    for bound in bounds {
        if bound.field.rule >= template.rules.len() {
            return Err(StrategistError::InvalidRule {
                rule: bound.field.rule,
                reason: format!(
                    "bound {} refers to a rule the strategy does not have",
                    bound.field
                ),
            });
        }
        bound
            .domain
            .validate()
            .map_err(|reason| StrategistError::ConfigInvalid {
                section: "optimize".into(),
                key: bound.field.to_string(),
                reason,
            })?;
    }
    Ok(())
}

/// Rewrite the template's tunable fields with `params`.
pub fn apply_parameters(
    template: &Strategy,
    bounds: &[ParameterBound],
    params: &[f64],
) -> Result<Strategy, StrategistError> {
    if params.len() != bounds.len() {
        return Err(StrategistError::ConfigInvalid {
            section: "optimize".into(),
            key: "parameters".into(),
            reason: format!("expected {} parameters, got {}", bounds.len(), params.len()),
        });
    }

    let mut strategy = template.clone();
    for (bound, &value) in bounds.iter().zip(params) {
        let field = bound.field;
        let rule = strategy
            .rules
            .get_mut(field.rule)
            .ok_or_else(|| StrategistError::InvalidRule {
                rule: field.rule,
                reason: format!("no rule for parameter {}", field),
            })?;
        match field.kind {
            FieldKind::Percentage => rule.percentage = value,
            FieldKind::LargerOffset => rule.larger_offset = value.round() as i32,
            FieldKind::SmallerOffset => rule.smaller_offset = value.round() as i32,
        }
    }
    strategy.validate()?;
    Ok(strategy)
}

/// Current values of the bounded fields in `template`.
pub fn current_parameters(template: &Strategy, bounds: &[ParameterBound]) -> Vec<f64> {
    bounds
        .iter()
        .filter_map(|b| {
            let rule = template.rules.get(b.field.rule)?;
            Some(match b.field.kind {
                FieldKind::Percentage => rule.percentage,
                FieldKind::LargerOffset => rule.larger_offset as f64,
                FieldKind::SmallerOffset => rule.smaller_offset as f64,
            })
        })
        .collect()
}

/// `[0.5 × p, 3 × p]` for every rule's percentage.
pub fn default_percentage_bounds(template: &Strategy) -> Vec<ParameterBound> {
    template
        .rules
        .iter()
        .enumerate()
        .map(|(i, rule)| ParameterBound {
            field: TunableField {
                rule: i,
                kind: FieldKind::Percentage,
            },
            domain: SearchDomain::Continuous {
                low: rule.percentage * 0.5,
                high: rule.percentage * 3.0,
            },
        })
        .collect()
}

/// Offsets of every rule (scaled `[3 × o, 0.5 × o]`), then their percentages.
///
/// Zero offsets stay fixed at zero.
pub fn default_timing_bounds(template: &Strategy) -> Vec<ParameterBound> {
    let offset_bound = |rule: usize, kind: FieldKind, offset: i32| {
        let o = offset as f64;
        let low = (o * 3.0).round() as i64;
        let high = (o * 0.5).round().min(0.0) as i64;
        ParameterBound {
            field: TunableField { rule, kind },
            domain: SearchDomain::Integer {
                low: low.min(high),
                high,
            },
        }
    };

    let mut bounds: Vec<ParameterBound> = template
        .rules
        .iter()
        .enumerate()
        .map(|(i, r)| offset_bound(i, FieldKind::LargerOffset, r.larger_offset))
        .collect();
    bounds.extend(
        template
            .rules
            .iter()
            .enumerate()
            .map(|(i, r)| offset_bound(i, FieldKind::SmallerOffset, r.smaller_offset)),
    );
    bounds.extend(default_percentage_bounds(template));
    bounds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price::PriceField;
    use crate::domain::rule::Rule;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn template() -> Strategy {
        Strategy {
            name: "t".into(),
            ticker: "SPY".into(),
            rules: vec![
                Rule {
                    larger_offset: -10,
                    larger_field: PriceField::Close,
                    smaller_offset: 0,
                    smaller_field: PriceField::Close,
                    percentage: 1.0,
                    weight: -2.0,
                },
                Rule {
                    larger_offset: 0,
                    larger_field: PriceField::Close,
                    smaller_offset: -3,
                    smaller_field: PriceField::Close,
                    percentage: 2.0,
                    weight: -1.0,
                },
            ],
            buy_threshold: -2.5,
            sell_threshold: -2.5,
            starting_capital: 1000.0,
        }
    }

    #[test]
    fn default_percentage_bounds_scale_template() {
        let bounds = default_percentage_bounds(&template());
        assert_eq!(bounds.len(), 2);
        assert_eq!(
            bounds[1].domain,
            SearchDomain::Continuous {
                low: 1.0,
                high: 6.0
            }
        );
    }

    #[test]
    fn default_timing_bounds_cover_offsets_then_percentages() {
        let bounds = default_timing_bounds(&template());
        assert_eq!(bounds.len(), 6);
        assert_eq!(bounds[0].domain, SearchDomain::Integer { low: -30, high: -5 });
        assert_eq!(bounds[1].domain, SearchDomain::Integer { low: 0, high: 0 });
        assert_eq!(bounds[2].field.kind, FieldKind::SmallerOffset);
        assert_eq!(bounds[3].domain, SearchDomain::Integer { low: -9, high: -2 });
        assert_eq!(bounds[4].field.kind, FieldKind::Percentage);
    }

    #[test]
    fn apply_leaves_template_untouched() {
        let t = template();
        let bounds = default_percentage_bounds(&t);
        let tuned = apply_parameters(&t, &bounds, &[1.5, 2.5]).unwrap();
        assert_eq!(tuned.rules[0].percentage, 1.5);
        assert_eq!(tuned.rules[1].percentage, 2.5);
        assert_eq!(t.rules[0].percentage, 1.0);
        assert_eq!(current_parameters(&tuned, &bounds), vec![1.5, 2.5]);
    }

    #[test]
    fn apply_rounds_offsets() {
        let t = template();
        let bounds = default_timing_bounds(&t);
        let params = [-12.4, 0.0, 0.0, -4.6, 1.0, 2.0];
        let tuned = apply_parameters(&t, &bounds, &params).unwrap();
        assert_eq!(tuned.rules[0].larger_offset, -12);
        assert_eq!(tuned.rules[1].smaller_offset, -5);
    }

    #[test]
    fn apply_rejects_wrong_length() {
        let t = template();
        let bounds = default_percentage_bounds(&t);
        assert!(apply_parameters(&t, &bounds, &[1.0]).is_err());
    }

    #[test]
    fn apply_rejects_invalid_values() {
        let t = template();
        let bounds = default_percentage_bounds(&t);
        let err = apply_parameters(&t, &bounds, &[-1.0, 1.0]).unwrap_err();
        assert!(matches!(err, StrategistError::InvalidRule { rule: 0, .. }));
    }

    #[test]
    fn validate_bounds_rejects_missing_rule() {
        let bounds = vec![ParameterBound {
            field: TunableField {
                rule: 5,
                kind: FieldKind::Percentage,
            },
            domain: SearchDomain::Continuous { low: 0.5, high: 3.0 },
        }];
        assert!(validate_bounds(&template(), &bounds).is_err());
        assert!(validate_bounds(&template(), &[]).is_err());
    }

    #[test]
    fn snap_to_domain() {
        let choices = SearchDomain::Choices(vec![1.0, 1.5, 2.0]);
        assert_eq!(choices.snap(1.6), 1.5);
        assert_eq!(choices.snap(9.0), 2.0);
        let ints = SearchDomain::Integer { low: -15, high: -10 };
        assert_eq!(ints.snap(-9.2), -10.0);
        assert_eq!(ints.snap(-12.6), -13.0);
        let cont = SearchDomain::Continuous { low: 0.5, high: 3.0 };
        assert_eq!(cont.snap(4.0), 3.0);
    }

    #[test]
    fn unit_mapping_round_trips_through_snap() {
        let d = SearchDomain::Continuous { low: 0.5, high: 3.0 };
        assert!((d.from_unit(d.to_unit(1.5)) - 1.5).abs() < 1e-12);
        assert_eq!(SearchDomain::Integer { low: 0, high: 0 }.to_unit(0.0), 0.5);
    }

    #[test]
    fn samples_stay_in_domain() {
        let mut rng = StdRng::seed_from_u64(7);
        let d = SearchDomain::Integer { low: -5, high: -2 };
        for _ in 0..100 {
            let x = d.sample(&mut rng);
            assert!((-5.0..=-2.0).contains(&x));
            assert_eq!(x.fract(), 0.0);
        }
    }
}
