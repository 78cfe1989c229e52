//! Reserve recommender: a decision table, not an optimizer.
//!
//! Decision table (defaults from data/reserve/reserve_policy.json):
//!
//! | step | input                         | effect                                   |
//! |------|-------------------------------|------------------------------------------|
//! | 1    | tier                          | base band: Low 0, Medium 2, High 3, VeryHigh 4 |
//! | 2    | trust High / Medium / Low     | shift -1 / 0 / +1                        |
//! | 2b   | model score >= threshold      | shift forced to +1                       |
//! | 3    | band (clamped)                | 0 None, 1 TimeDelay 7d, 2 Fixed $2.5k 90d, 3 Rolling 10% 120d, 4 Both 15% + $5k 180d |
//! | 4    | recent failed transfer        | at least Rolling (failed_transfer_floor) |
//! | 5    | category                      | additive percentage, type unchanged      |
//! | 6    | unfulfilled exposure          | fixed minimum raised to exposure         |
//!
//! `ReserveRecommender::decision_table` enumerates steps 1-4 for every
//! (tier, shift, failed transfer) combination.

use crate::{
    composite::RiskTier,
    entity::{Entity, TrustCategory},
    error::ConfigError,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ordered by aggressiveness: None < TimeDelay < Fixed < Rolling < Both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReserveType {
    None,
    TimeDelay,
    Fixed,
    Rolling,
    Both,
}

impl ReserveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None      => "none",
            Self::TimeDelay => "time_delay",
            Self::Fixed     => "fixed",
            Self::Rolling   => "rolling",
            Self::Both      => "both",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservePolicy {
    pub reserve_type:   ReserveType,
    pub percentage:     Option<f64>,
    pub minimum_amount: Option<f64>,
    pub hold_days:      Option<u32>,
}

impl ReservePolicy {
    pub fn none() -> Self {
        Self { reserve_type: ReserveType::None, percentage: None, minimum_amount: None, hold_days: None }
    }

    pub fn time_delay(hold_days: u32) -> Self {
        Self { reserve_type: ReserveType::TimeDelay, percentage: None, minimum_amount: None, hold_days: Some(hold_days) }
    }

    pub fn fixed(minimum_amount: f64, hold_days: u32) -> Self {
        Self {
            reserve_type:   ReserveType::Fixed,
            percentage:     None,
            minimum_amount: Some(minimum_amount),
            hold_days:      Some(hold_days),
        }
    }

    pub fn rolling(percentage: f64, hold_days: u32) -> Self {
        Self {
            reserve_type:   ReserveType::Rolling,
            percentage:     Some(percentage),
            minimum_amount: None,
            hold_days:      Some(hold_days),
        }
    }

    pub fn both(percentage: f64, minimum_amount: f64, hold_days: u32) -> Self {
        Self {
            reserve_type:   ReserveType::Both,
            percentage:     Some(percentage),
            minimum_amount: Some(minimum_amount),
            hold_days:      Some(hold_days),
        }
    }

    /// Each type carries exactly the fields it needs.
    pub fn validate(&self, context: &str) -> Result<(), ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidPolicy {
            context: context.to_string(),
            reason:  reason.to_string(),
        };
        let pct_ok = |p: Option<f64>| p.is_some_and(|p| p.is_finite() && p > 0.0 && p <= 100.0);
        let amount_ok = |a: Option<f64>| a.is_some_and(|a| a.is_finite() && a > 0.0);
        let hold_ok = |h: Option<u32>| h.is_some_and(|h| h > 0);

        let (needs_pct, needs_amount, needs_hold) = match self.reserve_type {
            ReserveType::None      => (false, false, false),
            ReserveType::TimeDelay => (false, false, true),
            ReserveType::Fixed     => (false, true, true),
            ReserveType::Rolling   => (true, false, true),
            ReserveType::Both      => (true, true, true),
        };
        if needs_pct != self.percentage.is_some() || (needs_pct && !pct_ok(self.percentage)) {
            return Err(invalid("percentage must be in (0, 100] exactly when the type holds a percentage"));
        }
        if needs_amount != self.minimum_amount.is_some() || (needs_amount && !amount_ok(self.minimum_amount)) {
            return Err(invalid("minimum_amount must be positive exactly when the type holds a fixed amount"));
        }
        if needs_hold != self.hold_days.is_some() || (needs_hold && !hold_ok(self.hold_days)) {
            return Err(invalid("hold_days must be positive exactly when the type holds funds"));
        }
        Ok(())
    }
}

/// Band index for each tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBands {
    pub low:       usize,
    pub medium:    usize,
    pub high:      usize,
    pub very_high: usize,
}

impl TierBands {
    pub fn get(&self, tier: RiskTier) -> usize {
        match tier {
            RiskTier::Low      => self.low,
            RiskTier::Medium   => self.medium,
            RiskTier::High     => self.high,
            RiskTier::VeryHigh => self.very_high,
        }
    }
}

/// Trust score bands used when an entity has no trust category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrustBands {
    /// Scores strictly below this are Low.
    pub low:  f64,
    /// Scores at or above this are High.
    pub high: f64,
}

impl TrustBands {
    pub fn categorize(&self, score: f64) -> TrustCategory {
        if score >= self.high {
            TrustCategory::High
        } else if score < self.low {
            TrustCategory::Low
        } else {
            TrustCategory::Medium
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveConfig {
    pub bands:                      Vec<ReservePolicy>,
    pub tier_bands:                 TierBands,
    pub trust_bands:                TrustBands,
    pub model_escalation_threshold: f64,
    pub failed_transfer_floor:      ReservePolicy,
    #[serde(default)]
    pub category_adjustments:       HashMap<String, f64>,
}

impl ReserveConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bands.is_empty() {
            return Err(ConfigError::EmptyBandTable);
        }
        for (i, band) in self.bands.iter().enumerate() {
            band.validate(&format!("band {i}"))?;
        }
        if self.bands.windows(2).any(|w| w[0].reserve_type > w[1].reserve_type) {
            return Err(ConfigError::InvalidPolicy {
                context: "bands".into(),
                reason:  "band types must be ordered from least to most aggressive".into(),
            });
        }
        for tier in RiskTier::ALL {
            let band = self.tier_bands.get(tier);
            if band >= self.bands.len() {
                return Err(ConfigError::BandOutOfRange {
                    tier: tier.as_str().into(),
                    band,
                    len:  self.bands.len(),
                });
            }
        }
        if RiskTier::ALL.windows(2).any(|w| self.tier_bands.get(w[0]) > self.tier_bands.get(w[1])) {
            return Err(ConfigError::InvalidPolicy {
                context: "tier_bands".into(),
                reason:  "higher tiers must not map to lower bands".into(),
            });
        }
        let tb = self.trust_bands;
        if !(tb.low.is_finite() && tb.high.is_finite() && tb.low >= 0.0 && tb.low <= tb.high) {
            return Err(ConfigError::InvalidTrustBands { low: tb.low, high: tb.high });
        }
        let t = self.model_escalation_threshold;
        if !(0.0..=1.0).contains(&t) {
            return Err(ConfigError::InvalidModelThreshold(t));
        }
        self.failed_transfer_floor.validate("failed_transfer_floor")?;
        if self.failed_transfer_floor.reserve_type < ReserveType::Rolling {
            return Err(ConfigError::InvalidPolicy {
                context: "failed_transfer_floor".into(),
                reason:  "must be at least a rolling reserve".into(),
            });
        }
        for (category, adj) in &self.category_adjustments {
            if !adj.is_finite() || *adj < 0.0 {
                return Err(ConfigError::InvalidPolicy {
                    context: format!("category_adjustments.{category}"),
                    reason:  "adjustment must be a non-negative percentage".into(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustShift {
    Down,
    Neutral,
    Up,
}

impl TrustShift {
    pub const ALL: [TrustShift; 3] = [Self::Down, Self::Neutral, Self::Up];

    fn apply(&self, band: usize, len: usize) -> usize {
        let top = len.saturating_sub(1);
        match self {
            Self::Down    => band.saturating_sub(1),
            Self::Neutral => band.min(top),
            Self::Up      => (band + 1).min(top),
        }
    }
}

/// Adjustments applied on top of the tier's base band, kept for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReserveOverride {
    TrustRelief,
    TrustEscalation,
    ModelEscalation,
    FailedTransferFloor,
    CategoryAdjustment,
    ExposureFloor,
}

/// Everything the recommender reads about one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ReserveInputs {
    pub tier:               RiskTier,
    pub category:           Option<String>,
    pub trust:              TrustCategory,
    pub model_score:        Option<f64>,
    pub failed_transfer:    bool,
    pub unfulfilled_amount: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReserveRecommendation {
    pub policy:    ReservePolicy,
    pub band:      usize,
    pub shift:     TrustShift,
    pub overrides: Vec<ReserveOverride>,
}

/// One row of the auditable decision table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRow {
    pub tier:            RiskTier,
    pub shift:           TrustShift,
    pub failed_transfer: bool,
    pub band:            usize,
    pub policy:          ReservePolicy,
}

#[derive(Debug, Clone)]
pub struct ReserveRecommender {
    config: ReserveConfig,
}

impl ReserveRecommender {
    pub fn new(config: &ReserveConfig) -> Self {
        let mut config = config.clone();
        config.category_adjustments = config
            .category_adjustments
            .into_iter()
            .map(|(k, v)| (k.trim().to_ascii_lowercase(), v))
            .collect();
        Self { config }
    }

    /// Entity trust category, falling back to the score bands.
    /// A non-finite trust score is unknown.
    pub fn trust_category(&self, entity: &Entity) -> Option<TrustCategory> {
        entity.trust_category.or_else(|| {
            entity
                .trust_score
                .filter(|s| s.is_finite())
                .map(|s| self.config.trust_bands.categorize(s))
        })
    }

    /// Trust moves the band by at most one; a high model score vetoes relief.
    pub fn shift(&self, trust: TrustCategory, model_score: Option<f64>) -> TrustShift {
        if model_score.is_some_and(|s| s.is_finite() && s >= self.config.model_escalation_threshold) {
            return TrustShift::Up;
        }
        match trust {
            TrustCategory::High   => TrustShift::Down,
            TrustCategory::Medium => TrustShift::Neutral,
            TrustCategory::Low    => TrustShift::Up,
        }
    }

    /// Steps 1-4 of the decision table. Returns the band, its policy and
    /// whether the failed-transfer floor replaced the tier policy.
    pub fn table_policy(
        &self,
        tier: RiskTier,
        shift: TrustShift,
        failed_transfer: bool,
    ) -> (usize, ReservePolicy, bool) {
        let band = shift.apply(self.config.tier_bands.get(tier), self.config.bands.len());
        let policy = match self.config.bands.get(band) {
            Some(p) => p.clone(),
            None    => ReservePolicy::none(),
        };
        if failed_transfer && policy.reserve_type < ReserveType::Rolling {
            return (band, self.config.failed_transfer_floor.clone(), true);
        }
        (band, policy, false)
    }

    pub fn recommend(&self, inputs: &ReserveInputs) -> ReserveRecommendation {
        let mut overrides = Vec::new();
        let shift = self.shift(inputs.trust, inputs.model_score);
        match shift {
            TrustShift::Down => overrides.push(ReserveOverride::TrustRelief),
            TrustShift::Up if inputs.trust == TrustCategory::Low => overrides.push(ReserveOverride::TrustEscalation),
            TrustShift::Up => overrides.push(ReserveOverride::ModelEscalation),
            TrustShift::Neutral => {}
        }

        let (band, mut policy, floored) = self.table_policy(inputs.tier, shift, inputs.failed_transfer);
        if floored {
            overrides.push(ReserveOverride::FailedTransferFloor);
        }

        if let (Some(pct), Some(category)) = (policy.percentage, inputs.category.as_deref()) {
            let adj = self
                .config
                .category_adjustments
                .get(&category.trim().to_ascii_lowercase())
                .copied()
                .unwrap_or(0.0);
            if adj > 0.0 {
                policy.percentage = Some((pct + adj).min(100.0));
                overrides.push(ReserveOverride::CategoryAdjustment);
            }
        }

        let exposure = inputs.unfulfilled_amount.filter(|e| e.is_finite());
        if let (Some(min), Some(exposure)) = (policy.minimum_amount, exposure) {
            if exposure > min {
                policy.minimum_amount = Some(exposure);
                overrides.push(ReserveOverride::ExposureFloor);
            }
        }

        ReserveRecommendation { policy, band, shift, overrides }
    }

    /// Every (tier, shift, failed transfer) row and the policy it yields.
    pub fn decision_table(&self) -> Vec<DecisionRow> {
        let mut rows = Vec::with_capacity(RiskTier::ALL.len() * TrustShift::ALL.len() * 2);
        for tier in RiskTier::ALL {
            for shift in TrustShift::ALL {
                for failed_transfer in [false, true] {
                    let (band, policy, _) = self.table_policy(tier, shift, failed_transfer);
                    rows.push(DecisionRow { tier, shift, failed_transfer, band, policy });
                }
            }
        }
        rows
    }
}
