//! Threshold ladders: ordered `(conditions, score)` rungs.
//!
//! Evaluated top to bottom, first matching rung wins, no match scores 0.
//! A rung matches when every one of its conditions holds (logical AND).

use crate::{error::ConfigError, types::{FactorScore, MAX_FACTOR_SCORE}};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Lt,
    Lte,
    Gt,
    Gte,
}

impl Comparison {
    pub fn holds(&self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Lt  => lhs <  rhs,
            Self::Lte => lhs <= rhs,
            Self::Gt  => lhs >  rhs,
            Self::Gte => lhs >= rhs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub metric: String,
    pub op:     Comparison,
    pub value:  f64,
}

impl Condition {
    pub fn new(metric: &str, op: Comparison, value: f64) -> Self {
        Self { metric: metric.to_string(), op, value }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rung {
    pub when:  Vec<Condition>,
    pub score: FactorScore,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdLadder {
    pub rungs: Vec<Rung>,
}

/// Named metric values a factor exposes to its ladder.
pub type Metrics<'a> = &'a [(&'static str, f64)];

impl ThresholdLadder {
    pub fn new(rungs: Vec<Rung>) -> Self {
        Self { rungs }
    }

    /// Score `metrics` against the ladder. First match wins; default 0.
    ///
    /// A condition naming a metric absent from `metrics` never holds.
    /// `validate` rejects such ladders up front, so at scoring time this
    /// only matters for hand-built ladders in tests.
    pub fn evaluate(&self, metrics: Metrics<'_>) -> FactorScore {
        self.rungs
            .iter()
            .find(|rung| {
                rung.when.iter().all(|c| {
                    metrics
                        .iter()
                        .find(|(name, _)| *name == c.metric)
                        .is_some_and(|(_, v)| c.op.holds(*v, c.value))
                })
            })
            .map(|rung| rung.score)
            .unwrap_or(0)
    }

    /// Reject rungs that reference metrics the factor does not expose,
    /// have no conditions, score out of range, or compare against NaN/inf.
    pub fn validate(&self, factor: &str, allowed: &[&str]) -> Result<(), ConfigError> {
        for (i, rung) in self.rungs.iter().enumerate() {
            if rung.when.is_empty() {
                return Err(ConfigError::EmptyRung { factor: factor.into(), rung: i });
            }
            if rung.score > MAX_FACTOR_SCORE {
                return Err(ConfigError::ScoreOutOfRange {
                    factor: factor.into(),
                    rung:   i,
                    score:  rung.score,
                    max:    MAX_FACTOR_SCORE,
                });
            }
            for c in &rung.when {
                if !allowed.contains(&c.metric.as_str()) {
                    return Err(ConfigError::UnknownMetric {
                        factor: factor.into(),
                        metric: c.metric.clone(),
                    });
                }
                if !c.value.is_finite() {
                    return Err(ConfigError::NonFiniteThreshold { factor: factor.into(), rung: i });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Comparison::*;

    fn ladder() -> ThresholdLadder {
        ThresholdLadder::new(vec![
            Rung { when: vec![Condition::new("x", Gte, 10.0), Condition::new("y", Lt, 5.0)], score: 3 },
            Rung { when: vec![Condition::new("x", Gte, 10.0)], score: 2 },
            Rung { when: vec![Condition::new("x", Gt, 1.0)], score: 1 },
        ])
    }

    #[test]
    fn first_matching_rung_wins() {
        let l = ladder();
        assert_eq!(l.evaluate(&[("x", 10.0), ("y", 1.0)]), 3);
        assert_eq!(l.evaluate(&[("x", 10.0), ("y", 9.0)]), 2);
        assert_eq!(l.evaluate(&[("x", 2.0), ("y", 1.0)]), 1);
    }

    #[test]
    fn no_match_scores_zero() {
        assert_eq!(ladder().evaluate(&[("x", 1.0), ("y", 0.0)]), 0);
        assert_eq!(ThresholdLadder::default().evaluate(&[("x", 100.0)]), 0);
    }

    #[test]
    fn absent_metric_never_matches() {
        assert_eq!(ladder().evaluate(&[("y", 0.0)]), 0);
    }

    #[test]
    fn validate_rejects_unknown_metric() {
        let err = ladder().validate("test", &["x"]).unwrap_err();
        assert_eq!(err, ConfigError::UnknownMetric { factor: "test".into(), metric: "y".into() });
    }

    #[test]
    fn validate_rejects_out_of_range_score() {
        let l = ThresholdLadder::new(vec![Rung { when: vec![Condition::new("x", Gt, 0.0)], score: 4 }]);
        assert!(matches!(l.validate("test", &["x"]), Err(ConfigError::ScoreOutOfRange { .. })));
    }

    #[test]
    fn validate_rejects_empty_rung_and_nan() {
        let empty = ThresholdLadder::new(vec![Rung { when: vec![], score: 1 }]);
        assert!(matches!(empty.validate("t", &["x"]), Err(ConfigError::EmptyRung { .. })));

        let nan = ThresholdLadder::new(vec![Rung { when: vec![Condition::new("x", Gt, f64::NAN)], score: 1 }]);
        assert!(matches!(nan.validate("t", &["x"]), Err(ConfigError::NonFiniteThreshold { .. })));
    }
}
