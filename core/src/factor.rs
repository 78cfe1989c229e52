//! Risk factor scorer.
//!
//! Each factor is an independent pure function: it reads only its own
//! fields of the fact set (plus entity attributes), derives the metrics
//! its ladder speaks about, and scores them. No factor reads another
//! factor's output.
//!
//! Factors:
//!   velocity             burst count vs. account age
//!   verification_failure max(AVS, CVV) failure rate
//!   amount_pattern       large and suspiciously uniform amounts
//!   category_risk        direct category lookup (not a ladder)
//!   age_activity         volume processed by a young account
//!   timing               max(off-hours, weekend) ratio
//!
//! The historical adverse-event factor lives apart (`HistoricalAdverse`)
//! and is used to validate the model only; it never feeds the composite.

use crate::{
    config::EngineConfig,
    entity::{Entity, WindowedFactSet},
    error::ConfigError,
    ladder::ThresholdLadder,
    reason::{DominantReason, ReasonResolver},
    types::FactorScore,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The six factors that make up the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    Velocity,
    VerificationFailure,
    AmountPattern,
    CategoryRisk,
    AgeActivity,
    Timing,
}

impl RiskFactor {
    pub const ALL: [RiskFactor; 6] = [
        Self::Velocity,
        Self::VerificationFailure,
        Self::AmountPattern,
        Self::CategoryRisk,
        Self::AgeActivity,
        Self::Timing,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Velocity            => "velocity",
            Self::VerificationFailure => "verification_failure",
            Self::AmountPattern       => "amount_pattern",
            Self::CategoryRisk        => "category_risk",
            Self::AgeActivity         => "age_activity",
            Self::Timing              => "timing",
        }
    }

    /// Metric names this factor exposes to its ladder.
    /// Category risk is a direct lookup and exposes none.
    pub fn metrics(&self) -> &'static [&'static str] {
        match self {
            Self::Velocity            => &["max_daily_txn_count", "account_age_days"],
            Self::VerificationFailure => &["max_failure_rate"],
            Self::AmountPattern       => &["avg_amount", "amount_cv"],
            Self::CategoryRisk        => &[],
            Self::AgeActivity         => &["account_age_days", "total_volume"],
            Self::Timing              => &["max_skew_ratio"],
        }
    }
}

/// A required input was unknown for this factor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingInput {
    pub factor: String,
    pub field:  String,
}

impl MissingInput {
    fn new(factor: &str, field: &str) -> Self {
        Self { factor: factor.into(), field: field.into() }
    }
}

pub type FactorResult = Result<FactorScore, MissingInput>;

/// Ladders for the ladder-driven factors plus the category table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactorLadders {
    pub velocity:             ThresholdLadder,
    pub verification_failure: ThresholdLadder,
    pub amount_pattern:       ThresholdLadder,
    pub age_activity:         ThresholdLadder,
    pub timing:               ThresholdLadder,
    pub historical_adverse:   ThresholdLadder,
}

impl FactorLadders {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.velocity.validate("velocity", RiskFactor::Velocity.metrics())?;
        self.verification_failure
            .validate("verification_failure", RiskFactor::VerificationFailure.metrics())?;
        self.amount_pattern.validate("amount_pattern", RiskFactor::AmountPattern.metrics())?;
        self.age_activity.validate("age_activity", RiskFactor::AgeActivity.metrics())?;
        self.timing.validate("timing", RiskFactor::Timing.metrics())?;
        self.historical_adverse
            .validate(HistoricalAdverse::NAME, HistoricalAdverse::METRICS)?;
        Ok(())
    }
}

fn require<T: Copy>(value: Option<T>, factor: RiskFactor, field: &str) -> Result<T, MissingInput> {
    value.ok_or_else(|| MissingInput::new(factor.name(), field))
}

/// NaN and infinities are unknown, not values: they go through the
/// missing-input policy like `None`.
fn require_finite(value: Option<f64>, factor: RiskFactor, field: &str) -> Result<f64, MissingInput> {
    require(value.filter(|v| v.is_finite()), factor, field)
}

/// Scores the six composite factors. Holds only read-only configuration.
#[derive(Debug, Clone)]
pub struct FactorScorer {
    ladders:       FactorLadders,
    category_risk: HashMap<String, FactorScore>,
}

impl FactorScorer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            ladders:       config.ladders.clone(),
            category_risk: config
                .category_risk
                .iter()
                .map(|(k, v)| (k.trim().to_ascii_lowercase(), *v))
                .collect(),
        }
    }

    pub fn score(&self, factor: RiskFactor, entity: &Entity, facts: &WindowedFactSet) -> FactorResult {
        match factor {
            RiskFactor::Velocity            => self.velocity(entity, facts),
            RiskFactor::VerificationFailure => self.verification_failure(facts),
            RiskFactor::AmountPattern       => self.amount_pattern(facts),
            RiskFactor::CategoryRisk        => self.category_risk(entity),
            RiskFactor::AgeActivity         => self.age_activity(entity, facts),
            RiskFactor::Timing              => self.timing(facts),
        }
    }

    pub fn velocity(&self, entity: &Entity, facts: &WindowedFactSet) -> FactorResult {
        let f = RiskFactor::Velocity;
        let burst = require(facts.max_daily_txn_count, f, "max_daily_txn_count")?;
        let age = require(entity.account_age_days, f, "account_age_days")?;
        Ok(self.ladders.velocity.evaluate(&[
            ("max_daily_txn_count", burst as f64),
            ("account_age_days", age as f64),
        ]))
    }

    pub fn verification_failure(&self, facts: &WindowedFactSet) -> FactorResult {
        let f = RiskFactor::VerificationFailure;
        let avs = require_finite(facts.avs_failure_rate, f, "avs_failure_rate")?;
        let cvv = require_finite(facts.cvv_failure_rate, f, "cvv_failure_rate")?;
        Ok(self
            .ladders
            .verification_failure
            .evaluate(&[("max_failure_rate", avs.max(cvv))]))
    }

    /// High averages score higher when amounts barely vary.
    pub fn amount_pattern(&self, facts: &WindowedFactSet) -> FactorResult {
        let f = RiskFactor::AmountPattern;
        let avg = require_finite(facts.avg_amount, f, "avg_amount")?;
        let std = require_finite(facts.std_amount, f, "std_amount")?;
        let cv = if avg > 0.0 { std / avg } else { 0.0 };
        Ok(self
            .ladders
            .amount_pattern
            .evaluate(&[("avg_amount", avg), ("amount_cv", cv)]))
    }

    /// Direct lookup; unlisted categories score 0.
    pub fn category_risk(&self, entity: &Entity) -> FactorResult {
        let category = entity
            .normalized_category()
            .ok_or_else(|| MissingInput::new(RiskFactor::CategoryRisk.name(), "category"))?;
        Ok(self.category_risk.get(&category).copied().unwrap_or(0))
    }

    pub fn age_activity(&self, entity: &Entity, facts: &WindowedFactSet) -> FactorResult {
        let f = RiskFactor::AgeActivity;
        let age = require(entity.account_age_days, f, "account_age_days")?;
        let volume = require_finite(facts.total_volume, f, "total_volume")?;
        Ok(self.ladders.age_activity.evaluate(&[
            ("account_age_days", age as f64),
            ("total_volume", volume),
        ]))
    }

    pub fn timing(&self, facts: &WindowedFactSet) -> FactorResult {
        let f = RiskFactor::Timing;
        let off_hours = require_finite(facts.off_hours_ratio, f, "off_hours_ratio")?;
        let weekend = require_finite(facts.weekend_ratio, f, "weekend_ratio")?;
        Ok(self
            .ladders
            .timing
            .evaluate(&[("max_skew_ratio", off_hours.max(weekend))]))
    }
}

/// Historical adverse-event factor. Validation only.
///
/// Its output type is deliberately not a `RiskFactor`, so the composite
/// has no way to accept it.
#[derive(Debug, Clone)]
pub struct HistoricalAdverse {
    ladder: ThresholdLadder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalAdverseScore(pub FactorScore);

impl HistoricalAdverse {
    pub const NAME: &'static str = "historical_adverse";
    pub const METRICS: &'static [&'static str] =
        &["dominant_reason_severity", "adverse_event_count", "adverse_event_rate"];

    pub fn new(config: &EngineConfig) -> Self {
        Self { ladder: config.ladders.historical_adverse.clone() }
    }

    pub fn score(
        &self,
        resolver: &ReasonResolver,
        dominant: &DominantReason,
        facts: &WindowedFactSet,
    ) -> Result<HistoricalAdverseScore, MissingInput> {
        // No recorded events at all is a known zero, not an unknown.
        if *dominant == DominantReason::NoEvents && facts.adverse_event_count.unwrap_or(0) == 0 {
            return Ok(HistoricalAdverseScore(0));
        }
        let count = facts
            .adverse_event_count
            .ok_or_else(|| MissingInput::new(Self::NAME, "adverse_event_count"))?;
        let rate = facts
            .count_based_adverse_rate()
            .ok_or_else(|| MissingInput::new(Self::NAME, "adverse_event_rate"))?;
        let severity = resolver.severity(dominant);
        Ok(HistoricalAdverseScore(self.ladder.evaluate(&[
            ("dominant_reason_severity", severity as f64),
            ("adverse_event_count", count as f64),
            ("adverse_event_rate", rate),
        ])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(age: u32, category: &str) -> Entity {
        Entity {
            entity_id:        "m-1".into(),
            account_age_days: Some(age),
            category:         Some(category.into()),
            country:          Some("US".into()),
            trust_score:      Some(50.0),
            trust_category:   None,
            model_score:      None,
        }
    }

    #[test]
    fn category_lookup_is_case_insensitive() {
        let scorer = FactorScorer::new(&EngineConfig::default_test());
        assert_eq!(scorer.category_risk(&entity(100, " Gambling ")), Ok(3));
        assert_eq!(scorer.category_risk(&entity(100, "bakery")), Ok(0));
    }

    #[test]
    fn missing_field_is_named() {
        let scorer = FactorScorer::new(&EngineConfig::default_test());
        let facts = WindowedFactSet { avs_failure_rate: Some(0.3), ..Default::default() };
        assert_eq!(
            scorer.verification_failure(&facts),
            Err(MissingInput::new("verification_failure", "cvv_failure_rate"))
        );
    }

    #[test]
    fn zero_average_has_zero_cv() {
        let scorer = FactorScorer::new(&EngineConfig::default_test());
        let facts = WindowedFactSet { avg_amount: Some(0.0), std_amount: Some(0.0), ..Default::default() };
        assert_eq!(scorer.amount_pattern(&facts), Ok(0));
    }
}
