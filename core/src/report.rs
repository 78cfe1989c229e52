//! Report assembler: packages one scoring pass into an immutable
//! `RecommendationRecord`.
//!
//! A record is never updated in place. Every run creates a new record with
//! its own id and timestamp, plus the snapshot reference and a copy of the
//! inputs it was computed from, so an audit can reproduce it exactly.

use crate::{
    clock::Clock,
    composite::{CompositeInputs, CompositeOutcome, FactorScores, RiskTier},
    entity::{Entity, EventReason, TrustCategory, WindowedFactSet},
    factor::MissingInput,
    reason::DominantReason,
    reserve::{ReserveOverride, ReservePolicy, ReserveRecommendation},
    snapshot::SignalSnapshot,
    types::{EntityId, FactorScore, RunId, SnapshotId},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Deterministic result of scoring one snapshot. No ids, no timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringOutcome {
    pub inputs:          CompositeInputs,
    pub composite:       CompositeOutcome,
    pub dominant_reason: DominantReason,
    pub historical:      Option<FactorScore>,
    pub reserve:         ReserveRecommendation,
    pub trust_used:      TrustCategory,
    pub failed_transfer: bool,
    /// Recommender inputs that were unknown and defaulted.
    pub reserve_missing: Vec<MissingInput>,
}

/// Exactly what the engine read to produce a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    pub captured_at:     DateTime<Utc>,
    pub entity:          Entity,
    pub facts:           WindowedFactSet,
    pub reasons:         Vec<EventReason>,
    pub trust_used:      TrustCategory,
    pub failed_transfer: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationRecord {
    pub recommendation_id:  String,
    pub run_id:             RunId,
    pub entity_id:          EntityId,
    pub snapshot_id:        SnapshotId,
    pub window_days:        u32,
    pub computed_at:        DateTime<Utc>,
    pub config_version:     String,
    pub factor_scores:      FactorScores,
    pub composite:          u32,
    pub tier:               RiskTier,
    pub dominant_reason:    DominantReason,
    /// Validation-only score; never part of `composite`.
    pub historical_adverse: Option<FactorScore>,
    pub reserve:            ReservePolicy,
    pub reserve_band:       usize,
    pub reserve_overrides:  Vec<ReserveOverride>,
    pub partial:            bool,
    pub missing_inputs:     Vec<MissingInput>,
    pub audit:              AuditTrail,
}

pub struct ReportAssembler {
    clock:          Arc<dyn Clock>,
    config_version: String,
}

impl ReportAssembler {
    pub fn new(clock: Arc<dyn Clock>, config_version: impl Into<String>) -> Self {
        Self { clock, config_version: config_version.into() }
    }

    pub fn assemble(&self, run_id: &str, snapshot: &SignalSnapshot, outcome: ScoringOutcome) -> RecommendationRecord {
        let mut missing_inputs = outcome.inputs.missing;
        missing_inputs.extend(outcome.reserve_missing);

        RecommendationRecord {
            recommendation_id:  uuid::Uuid::new_v4().to_string(),
            run_id:             run_id.to_string(),
            entity_id:          snapshot.entity.entity_id.clone(),
            snapshot_id:        snapshot.snapshot_id.clone(),
            window_days:        snapshot.window_days,
            computed_at:        self.clock.now(),
            config_version:     self.config_version.clone(),
            factor_scores:      outcome.inputs.scores,
            composite:          outcome.composite.composite,
            tier:               outcome.composite.tier,
            dominant_reason:    outcome.dominant_reason,
            historical_adverse: outcome.historical,
            reserve:            outcome.reserve.policy,
            reserve_band:       outcome.reserve.band,
            reserve_overrides:  outcome.reserve.overrides,
            partial:            !missing_inputs.is_empty(),
            missing_inputs,
            audit: AuditTrail {
                captured_at:     snapshot.captured_at,
                entity:          snapshot.entity.clone(),
                facts:           snapshot.facts.clone(),
                reasons:         snapshot.reasons.clone(),
                trust_used:      outcome.trust_used,
                failed_transfer: outcome.failed_transfer,
            },
        }
    }
}
