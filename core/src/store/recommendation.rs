//! Store methods for recommendation records and batch summaries.
//! Both tables are append-only.

use super::{to_sql_time, RiskStore};
use crate::{
    composite::RiskTier,
    engine::BatchSummary,
    error::EngineResult,
    factor::RiskFactor,
    report::RecommendationRecord,
};
use rusqlite::{params, OptionalExtension};

impl RiskStore {
    pub fn insert_recommendation(&self, r: &RecommendationRecord) -> EngineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        self.write_recommendation(r)?;
        tx.commit()?;
        Ok(())
    }

    /// All records or none.
    pub fn insert_recommendations(&self, records: &[RecommendationRecord]) -> EngineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for r in records {
            self.write_recommendation(r)?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Caller owns the transaction.
    fn write_recommendation(&self, r: &RecommendationRecord) -> EngineResult<()> {
        let payload = serde_json::to_string(r)?;
        self.conn.execute(
            "INSERT INTO recommendation (recommendation_id, seq, run_id, entity_id, snapshot_id,
                computed_at, config_version, composite, tier, dominant_reason,
                historical_adverse, reserve_type, reserve_percentage,
                reserve_minimum_amount, reserve_hold_days, partial, payload)
             VALUES (?1, (SELECT COALESCE(MAX(seq), 0) + 1 FROM recommendation),
                     ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                r.recommendation_id,
                r.run_id,
                r.entity_id,
                r.snapshot_id,
                to_sql_time(&r.computed_at),
                r.config_version,
                r.composite,
                r.tier.as_str(),
                r.dominant_reason.code(),
                r.historical_adverse,
                r.reserve.reserve_type.as_str(),
                r.reserve.percentage,
                r.reserve.minimum_amount,
                r.reserve.hold_days,
                r.partial as i32,
                payload,
            ],
        )?;
        for factor in RiskFactor::ALL {
            self.conn.execute(
                "INSERT INTO recommendation_factor (recommendation_id, factor, score)
                 VALUES (?1, ?2, ?3)",
                params![r.recommendation_id, factor.name(), r.factor_scores.get(factor)],
            )?;
        }
        Ok(())
    }

    /// Every record for an entity, newest first. Rebuilt from the stored payload.
    /// Records stamped with the same time come back in reverse insertion order.
    pub fn recommendations_for_entity(&self, entity_id: &str) -> EngineResult<Vec<RecommendationRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT payload FROM recommendation WHERE entity_id = ?1
             ORDER BY computed_at DESC, seq DESC",
        )?;
        let payloads = stmt
            .query_map(params![entity_id], |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        let mut records = Vec::with_capacity(payloads.len());
        for p in payloads {
            records.push(serde_json::from_str(&p)?);
        }
        Ok(records)
    }

    pub fn latest_recommendation(&self, entity_id: &str) -> EngineResult<Option<RecommendationRecord>> {
        let payload: Option<String> = self
            .conn
            .query_row(
                "SELECT payload FROM recommendation WHERE entity_id = ?1
                 ORDER BY computed_at DESC, seq DESC LIMIT 1",
                params![entity_id],
                |r| r.get(0),
            )
            .optional()?;
        match payload {
            Some(p) => Ok(Some(serde_json::from_str(&p)?)),
            None    => Ok(None),
        }
    }

    /// Factor scores as stored in `recommendation_factor`, in factor order.
    pub fn factor_scores(&self, recommendation_id: &str) -> EngineResult<Vec<(String, u8)>> {
        let mut stmt = self.conn.prepare(
            "SELECT factor, score FROM recommendation_factor WHERE recommendation_id = ?1",
        )?;
        let mut rows = stmt
            .query_map(params![recommendation_id], |r| Ok((r.get::<_, String>(0)?, r.get::<_, u8>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        rows.sort_by_key(|(name, _)| RiskFactor::ALL.iter().position(|f| f.name() == name));
        Ok(rows)
    }

    /// Count of records per tier for one run.
    pub fn tier_counts(&self, run_id: &str) -> EngineResult<Vec<(RiskTier, i64)>> {
        let mut counts = Vec::with_capacity(RiskTier::ALL.len());
        for tier in RiskTier::ALL {
            let n: i64 = self.conn.query_row(
                "SELECT COUNT(*) FROM recommendation WHERE run_id = ?1 AND tier = ?2",
                params![run_id, tier.as_str()],
                |row| row.get(0),
            )?;
            counts.push((tier, n));
        }
        Ok(counts)
    }

    // ── Batch runs ─────────────────────────────────────────────

    pub fn insert_batch_run(&self, s: &BatchSummary) -> EngineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        self.write_batch_run(s)?;
        tx.commit()?;
        Ok(())
    }

    fn write_batch_run(&self, s: &BatchSummary) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO batch_run (run_id, config_version, started_at, finished_at,
                attempted, succeeded, partial, failed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                s.run_id,
                s.config_version,
                to_sql_time(&s.started_at),
                to_sql_time(&s.finished_at),
                s.attempted as i64,
                s.succeeded as i64,
                s.partial as i64,
                s.failed as i64,
            ],
        )?;
        for f in &s.failures {
            self.conn.execute(
                "INSERT INTO entity_failure (run_id, entity_id, kind, reason)
                 VALUES (?1, ?2, ?3, ?4)",
                params![s.run_id, f.entity_id, f.kind.as_str(), f.reason],
            )?;
        }
        Ok(())
    }

    pub fn failures_for_run(&self, run_id: &str) -> EngineResult<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT entity_id, kind FROM entity_failure WHERE run_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![run_id], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ── Test / summary helpers ────────────────────────────────────────

    pub fn recommendation_count(&self) -> EngineResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM recommendation", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn batch_run_count(&self) -> EngineResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM batch_run", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Persist a whole batch atomically: every record plus the summary.
    /// A rejected summary (e.g. a reused run id) leaves no records behind.
    pub fn persist_batch(&self, summary: &BatchSummary, records: &[RecommendationRecord]) -> EngineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        self.write_batch_run(summary)?;
        for r in records {
            self.write_recommendation(r)?;
        }
        tx.commit()?;
        log::info!(
            "Persisted run {}: {} records, {} failures",
            summary.run_id,
            records.len(),
            summary.failures.len()
        );
        Ok(())
    }
}

