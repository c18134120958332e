//! Weighted comparison rules.
//!
//! A rule compares two price lookups at day offsets relative to the evaluation
//! day and contributes its weight to that day's score when
//! `larger > smaller × (1 + percentage / 100)`.

use crate::domain::error::StrategistError;
use crate::domain::price::PriceField;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub larger_offset: i32,
    pub larger_field: PriceField,
    pub smaller_offset: i32,
    pub smaller_field: PriceField,
    pub percentage: f64,
    pub weight: f64,
}

impl Rule {
    /// Check the structural constraints; `index` is only used for the error.
    pub fn validate(&self, index: usize) -> Result<(), StrategistError> {
        if self.larger_offset > 0 {
            return Err(StrategistError::InvalidRule {
                rule: index,
                reason: format!("larger_offset must be <= 0, got {}", self.larger_offset),
            });
        }
        if self.smaller_offset > 0 {
            return Err(StrategistError::InvalidRule {
                rule: index,
                reason: format!("smaller_offset must be <= 0, got {}", self.smaller_offset),
            });
        }
        if !self.percentage.is_finite() || self.percentage < 0.0 {
            return Err(StrategistError::InvalidRule {
                rule: index,
                reason: format!("percentage must be >= 0, got {}", self.percentage),
            });
        }
        if !self.weight.is_finite() {
            return Err(StrategistError::InvalidRule {
                rule: index,
                reason: format!("weight must be finite, got {}", self.weight),
            });
        }
        Ok(())
    }

    /// The comparison itself. Strict `>`, no epsilon.
    pub fn fires(&self, larger: f64, smaller: f64) -> bool {
        larger > smaller * (1.0 + self.percentage / 100.0)
    }

    /// Deepest look-back in days this rule needs.
    pub fn max_lookback(&self) -> usize {
        self.larger_offset
            .min(self.smaller_offset)
            .unsigned_abs() as usize
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}[{}] > {}[{}] + {}% => {:+}",
            self.larger_field,
            self.larger_offset,
            self.smaller_field,
            self.smaller_offset,
            self.percentage,
            self.weight
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drop_rule() -> Rule {
        Rule {
            larger_offset: -10,
            larger_field: PriceField::Close,
            smaller_offset: 0,
            smaller_field: PriceField::Close,
            percentage: 1.0,
            weight: -2.0,
        }
    }

    #[test]
    fn fires_strictly_above_threshold() {
        let rule = drop_rule();
        assert!(rule.fires(102.0, 100.0));
        assert!(!rule.fires(100.5, 100.0));
        assert!(!rule.fires(100.0, 100.0));
    }

    #[test]
    fn zero_percentage_is_plain_comparison() {
        let rule = Rule {
            percentage: 0.0,
            ..drop_rule()
        };
        assert!(rule.fires(100.01, 100.0));
        assert!(!rule.fires(100.0, 100.0));
    }

    #[test]
    fn validate_rejects_positive_offset() {
        let rule = Rule {
            smaller_offset: 3,
            ..drop_rule()
        };
        let err = rule.validate(1).unwrap_err();
        assert!(matches!(err, StrategistError::InvalidRule { rule: 1, .. }));
    }

    #[test]
    fn validate_rejects_negative_percentage() {
        let rule = Rule {
            percentage: -0.5,
            ..drop_rule()
        };
        assert!(rule.validate(0).is_err());
    }

    #[test]
    fn max_lookback_uses_deepest_offset() {
        assert_eq!(drop_rule().max_lookback(), 10);
    }

    #[test]
    fn display() {
        assert_eq!(drop_rule().to_string(), "Close[-10] > Close[0] + 1% => -2");
    }
}
