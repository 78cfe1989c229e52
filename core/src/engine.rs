//! The scoring engine: per-entity pipeline plus the batch runner.
//!
//! PIPELINE ORDER (fixed, per entity):
//!   1. Fetch snapshot from the signal store
//!   2. Reason resolver and factor scorer (independent of each other)
//!   3. Missing-input policy, composite, tier
//!   4. Reserve recommender
//!   5. Report assembler
//!
//! RULES:
//!   - Configuration is validated once in `ScoringEngine::new` and never
//!     changes for the engine's lifetime. Every entity in a batch is judged
//!     by the same rules.
//!   - Entities never share mutable state. Workers only read the engine.
//!   - A failing entity is recorded in the batch summary; the batch goes on.

use crate::{
    clock::{Clock, SystemClock},
    composite::CompositeScorer,
    config::{EngineConfig, MissingFactPolicy},
    entity::TrustCategory,
    error::{EngineError, EngineResult},
    factor::{FactorScorer, HistoricalAdverse, MissingInput, RiskFactor},
    reason::ReasonResolver,
    report::{RecommendationRecord, ReportAssembler, ScoringOutcome},
    reserve::{ReserveInputs, ReserveRecommender},
    signal_store::SignalStore,
    snapshot::SignalSnapshot,
    types::{EntityId, RunId},
};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const RESERVE_INPUTS: &str = "reserve_recommender";

pub struct ScoringEngine {
    config:     Arc<EngineConfig>,
    resolver:   ReasonResolver,
    factors:    FactorScorer,
    historical: HistoricalAdverse,
    composite:  CompositeScorer,
    reserve:    ReserveRecommender,
    assembler:  ReportAssembler,
    clock:      Arc<dyn Clock>,
}

impl ScoringEngine {
    /// Validate the config and build every stage. Fails fast on any
    /// configuration defect, before a single entity is scored.
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> EngineResult<Self> {
        config.validate()?;
        let resolver = ReasonResolver::new(&config.reason_priority)?;
        let engine = Self {
            factors:    FactorScorer::new(&config),
            historical: HistoricalAdverse::new(&config),
            composite:  CompositeScorer::new(config.tier_cutoffs, config.missing_fact_policy),
            reserve:    ReserveRecommender::new(&config.reserve),
            assembler:  ReportAssembler::new(clock.clone(), config.version.clone()),
            resolver,
            clock,
            config:     Arc::new(config),
        };
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn reserve_recommender(&self) -> &ReserveRecommender {
        &self.reserve
    }

    /// Run steps 2-4 on one snapshot. Pure: no ids, no clock.
    /// Facts aggregated over a different window than the configured one
    /// are rejected; the ladders are calibrated for a single window.
    pub fn evaluate(&self, snapshot: &SignalSnapshot) -> EngineResult<ScoringOutcome> {
        let entity = &snapshot.entity;
        let facts = &snapshot.facts;
        if snapshot.window_days != self.config.window_days {
            return Err(EngineError::WindowMismatch {
                entity_id: entity.entity_id.clone(),
                expected:  self.config.window_days,
                actual:    snapshot.window_days,
            });
        }
        let to_error = |m: MissingInput| EngineError::MissingInput {
            entity_id: entity.entity_id.clone(),
            factor:    m.factor,
            field:     m.field,
        };

        let dominant_reason = self.resolver.resolve(&snapshot.reasons);

        let results = RiskFactor::ALL
            .iter()
            .map(|f| (*f, self.factors.score(*f, entity, facts)));
        let inputs = self.composite.collect(results).map_err(to_error)?;
        let composite = self.composite.evaluate(&inputs.scores);

        let historical = match self.historical.score(&self.resolver, &dominant_reason, facts) {
            Ok(score) => Some(score.0),
            Err(m) => {
                log::debug!("{}: historical factor unavailable ({})", entity.entity_id, m.field);
                None
            }
        };

        let mut reserve_missing = Vec::new();
        let trust_used = match self.reserve.trust_category(entity) {
            Some(t) => t,
            None => {
                self.on_missing(&mut reserve_missing, RESERVE_INPUTS, "trust_signal")
                    .map_err(to_error)?;
                TrustCategory::Medium
            }
        };
        let failed_transfer = match snapshot.facts.failed_transfers_recent {
            Some(n) => n > 0,
            None => {
                self.on_missing(&mut reserve_missing, RESERVE_INPUTS, "failed_transfers_recent")
                    .map_err(to_error)?;
                false
            }
        };

        let reserve = self.reserve.recommend(&ReserveInputs {
            tier: composite.tier,
            category: entity.normalized_category(),
            trust: trust_used,
            model_score: entity.model_score,
            failed_transfer,
            unfulfilled_amount: facts.unfulfilled_amount,
        });

        Ok(ScoringOutcome {
            inputs,
            composite,
            dominant_reason,
            historical,
            reserve,
            trust_used,
            failed_transfer,
            reserve_missing,
        })
    }

    /// Same policy as the composite: fail, or default and flag.
    fn on_missing(&self, missing: &mut Vec<MissingInput>, factor: &str, field: &str) -> Result<(), MissingInput> {
        let m = MissingInput { factor: factor.into(), field: field.into() };
        match self.composite.policy() {
            MissingFactPolicy::FailEntity     => Err(m),
            MissingFactPolicy::DefaultAndFlag => {
                missing.push(m);
                Ok(())
            }
        }
    }

    pub fn score_snapshot(&self, run_id: &str, snapshot: &SignalSnapshot) -> EngineResult<RecommendationRecord> {
        let outcome = self.evaluate(snapshot)?;
        let record = self.assembler.assemble(run_id, snapshot, outcome);
        log::debug!(
            "{}: composite={} tier={} reserve={:?}{}",
            record.entity_id,
            record.composite,
            record.tier.as_str(),
            record.reserve.reserve_type,
            if record.partial { " (partial)" } else { "" },
        );
        Ok(record)
    }

    /// Fetch-then-score for one entity. Also the on-demand lookup path.
    pub fn score_entity(
        &self,
        run_id: &str,
        store: &dyn SignalStore,
        entity_id: &str,
    ) -> EngineResult<RecommendationRecord> {
        let snapshot = store.fetch(entity_id)?;
        self.score_snapshot(run_id, &snapshot)
    }

    /// Score every listed entity (or every entity in the store) on a
    /// bounded worker pool. Only a store listing failure or a pool build
    /// failure aborts the batch; per-entity failures land in the summary.
    pub fn run_batch(
        &self,
        run_id: &str,
        store: &dyn SignalStore,
        entity_ids: Option<&[EntityId]>,
    ) -> EngineResult<BatchOutcome> {
        let started_at = self.clock.now();
        let ids: Vec<EntityId> = match entity_ids {
            Some(ids) => ids.to_vec(),
            None      => store.list_entities()?,
        };
        let workers = self.config.worker_count();
        log::info!("Batch {run_id}: scoring {} entities on {workers} workers", ids.len());

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("scorer-{i}"))
            .build()
            .map_err(|e| EngineError::WorkerPool(e.to_string()))?;

        let results: Vec<(EntityId, EngineResult<RecommendationRecord>)> = pool.install(|| {
            ids.par_iter()
                .map(|id| (id.clone(), self.score_entity(run_id, store, id)))
                .collect()
        });

        let mut records = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (entity_id, result) in results {
            match result {
                Ok(record) => records.push(record),
                Err(e) => {
                    log::warn!("Batch {run_id}: entity {entity_id} failed: {e}");
                    failures.push(EntityFailure::from_error(entity_id, &e));
                }
            }
        }

        let summary = BatchSummary {
            run_id:         run_id.to_string(),
            config_version: self.config.version.clone(),
            started_at,
            finished_at:    self.clock.now(),
            attempted:      ids.len(),
            succeeded:      records.len(),
            partial:        records.iter().filter(|r| r.partial).count(),
            failed:         failures.len(),
            failures,
        };
        log::info!(
            "Batch {run_id}: {} succeeded ({} partial), {} failed",
            summary.succeeded,
            summary.partial,
            summary.failed
        );
        Ok(BatchOutcome { summary, records })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The entity's facts could not be read.
    Fetch,
    /// A required fact was unknown under the fail-entity policy.
    MissingInput,
    /// The snapshot's aggregation window differs from the configured one.
    WindowMismatch,
    Scoring,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetch          => "fetch",
            Self::MissingInput   => "missing_input",
            Self::WindowMismatch => "window_mismatch",
            Self::Scoring        => "scoring",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFailure {
    pub entity_id: EntityId,
    pub kind:      FailureKind,
    pub reason:    String,
}

impl EntityFailure {
    fn from_error(entity_id: EntityId, error: &EngineError) -> Self {
        let kind = match error {
            EngineError::EntityNotFound { .. } | EngineError::Database(_) => FailureKind::Fetch,
            EngineError::MissingInput { .. } => FailureKind::MissingInput,
            EngineError::WindowMismatch { .. } => FailureKind::WindowMismatch,
            _ => FailureKind::Scoring,
        };
        Self { entity_id, kind, reason: error.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub run_id:         RunId,
    pub config_version: String,
    pub started_at:     DateTime<Utc>,
    pub finished_at:    DateTime<Utc>,
    pub attempted:      usize,
    pub succeeded:      usize,
    pub partial:        usize,
    pub failed:         usize,
    pub failures:       Vec<EntityFailure>,
}

#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub summary: BatchSummary,
    pub records: Vec<RecommendationRecord>,
}
