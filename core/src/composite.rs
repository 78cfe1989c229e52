//! Composite scorer and tier classifier.
//!
//! RULE: the composite only accepts `FactorScores`, which has exactly one
//! slot per `RiskFactor`. The historical adverse-event score has its own
//! type and cannot be summed in here.

use crate::{
    config::MissingFactPolicy,
    error::ConfigError,
    factor::{FactorResult, MissingInput, RiskFactor},
    types::FactorScore,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl RiskTier {
    pub const ALL: [RiskTier; 4] = [Self::Low, Self::Medium, Self::High, Self::VeryHigh];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low      => "low",
            Self::Medium   => "medium",
            Self::High     => "high",
            Self::VeryHigh => "very_high",
        }
    }
}

/// Lower bounds (inclusive) of each tier above Low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCutoffs {
    pub medium:    u32,
    pub high:      u32,
    pub very_high: u32,
}

impl TierCutoffs {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.medium == 0 || self.medium >= self.high || self.high >= self.very_high {
            return Err(ConfigError::NonAscendingCutoffs {
                medium:    self.medium,
                high:      self.high,
                very_high: self.very_high,
            });
        }
        Ok(())
    }

    pub fn classify(&self, composite: u32) -> RiskTier {
        if composite >= self.very_high {
            RiskTier::VeryHigh
        } else if composite >= self.high {
            RiskTier::High
        } else if composite >= self.medium {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

/// One named score per composite factor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactorScores {
    pub velocity:             FactorScore,
    pub verification_failure: FactorScore,
    pub amount_pattern:       FactorScore,
    pub category_risk:        FactorScore,
    pub age_activity:         FactorScore,
    pub timing:               FactorScore,
}

impl FactorScores {
    pub fn get(&self, factor: RiskFactor) -> FactorScore {
        match factor {
            RiskFactor::Velocity            => self.velocity,
            RiskFactor::VerificationFailure => self.verification_failure,
            RiskFactor::AmountPattern       => self.amount_pattern,
            RiskFactor::CategoryRisk        => self.category_risk,
            RiskFactor::AgeActivity         => self.age_activity,
            RiskFactor::Timing              => self.timing,
        }
    }

    pub fn set(&mut self, factor: RiskFactor, score: FactorScore) {
        match factor {
            RiskFactor::Velocity            => self.velocity = score,
            RiskFactor::VerificationFailure => self.verification_failure = score,
            RiskFactor::AmountPattern       => self.amount_pattern = score,
            RiskFactor::CategoryRisk        => self.category_risk = score,
            RiskFactor::AgeActivity         => self.age_activity = score,
            RiskFactor::Timing              => self.timing = score,
        }
    }

    pub fn sum(&self) -> u32 {
        RiskFactor::ALL.iter().map(|f| self.get(*f) as u32).sum()
    }
}

/// Factor scores after the missing-input policy has been applied.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeInputs {
    pub scores:  FactorScores,
    /// Inputs that were unknown and defaulted to 0.
    pub missing: Vec<MissingInput>,
}

impl CompositeInputs {
    pub fn is_partial(&self) -> bool {
        !self.missing.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeOutcome {
    pub composite: u32,
    pub tier:      RiskTier,
}

#[derive(Debug, Clone)]
pub struct CompositeScorer {
    cutoffs: TierCutoffs,
    policy:  MissingFactPolicy,
}

impl CompositeScorer {
    pub fn new(cutoffs: TierCutoffs, policy: MissingFactPolicy) -> Self {
        Self { cutoffs, policy }
    }

    pub fn policy(&self) -> MissingFactPolicy {
        self.policy
    }

    /// Apply the missing-input policy to raw factor results.
    ///
    /// `FailEntity` returns the first missing input in factor order.
    /// `DefaultAndFlag` scores each missing factor 0 and lists it.
    pub fn collect(
        &self,
        results: impl IntoIterator<Item = (RiskFactor, FactorResult)>,
    ) -> Result<CompositeInputs, MissingInput> {
        let mut scores = FactorScores::default();
        let mut missing = Vec::new();
        for (factor, result) in results {
            match result {
                Ok(score) => scores.set(factor, score),
                Err(m) => match self.policy {
                    MissingFactPolicy::FailEntity     => return Err(m),
                    MissingFactPolicy::DefaultAndFlag => {
                        scores.set(factor, 0);
                        missing.push(m);
                    }
                },
            }
        }
        Ok(CompositeInputs { scores, missing })
    }

    pub fn evaluate(&self, scores: &FactorScores) -> CompositeOutcome {
        let composite = scores.sum();
        CompositeOutcome { composite, tier: self.cutoffs.classify(composite) }
    }
}
