//! Store methods for entities, fact snapshots and reason records.

use super::{from_sql_time, to_sql_time, RiskStore};
use crate::{
    entity::{Entity, EventReason, TrustCategory, WindowedFactSet},
    error::EngineResult,
    snapshot::SignalSnapshot,
    types::EntityId,
};
use rusqlite::{params, OptionalExtension, Row};

const FACT_COLUMNS: &str = "snapshot_id, captured_at, window_days,
    total_volume, txn_count, avg_amount, std_amount, max_daily_txn_count,
    max_daily_volume, avs_failure_rate, cvv_failure_rate, high_risk_flag_rate,
    active_days, off_hours_ratio, weekend_ratio, adverse_event_count,
    adverse_event_rate, failed_transfers_recent, unfulfilled_amount, unfulfilled_count";

/// SQLite integers are i64; counts that do not fit are rejected, never wrapped.
fn to_sql_int<T: Into<u64>>(v: T) -> rusqlite::Result<i64> {
    i64::try_from(v.into()).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn opt_sql_int<T: Into<u64>>(v: Option<T>) -> rusqlite::Result<Option<i64>> {
    v.map(to_sql_int).transpose()
}

fn from_sql_int<T: TryFrom<i64>>(idx: usize, v: Option<i64>) -> rusqlite::Result<Option<T>>
where
    T::Error: std::error::Error + Send + Sync + 'static,
{
    v.map(|n| {
        T::try_from(n).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(e))
        })
    })
    .transpose()
}

impl RiskStore {
    // ── Entities ───────────────────────────────────────────────

    pub fn upsert_entity(&self, e: &Entity) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO entity (entity_id, account_age_days, category, country,
                trust_score, trust_category, model_score)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(entity_id) DO UPDATE SET
                account_age_days = excluded.account_age_days,
                category         = excluded.category,
                country          = excluded.country,
                trust_score      = excluded.trust_score,
                trust_category   = excluded.trust_category,
                model_score      = excluded.model_score",
            params![
                e.entity_id,
                opt_sql_int(e.account_age_days)?,
                e.category,
                e.country,
                e.trust_score,
                e.trust_category.map(|t| t.as_str()),
                e.model_score,
            ],
        )?;
        Ok(())
    }

    pub fn get_entity(&self, entity_id: &str) -> EngineResult<Option<Entity>> {
        let entity = self
            .conn
            .query_row(
                "SELECT entity_id, account_age_days, category, country,
                        trust_score, trust_category, model_score
                 FROM entity WHERE entity_id = ?1",
                params![entity_id],
                |r| {
                    let trust_category: Option<String> = r.get(5)?;
                    Ok(Entity {
                        entity_id:        r.get(0)?,
                        account_age_days: from_sql_int(1, r.get(1)?)?,
                        category:         r.get(2)?,
                        country:          r.get(3)?,
                        trust_score:      r.get(4)?,
                        trust_category:   trust_category.as_deref().and_then(TrustCategory::parse),
                        model_score:      r.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(entity)
    }

    /// Entities with at least one fact snapshot, in id order.
    pub fn list_entity_ids(&self) -> EngineResult<Vec<EntityId>> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT e.entity_id FROM entity e
             JOIN fact_snapshot f ON f.entity_id = e.entity_id
             ORDER BY e.entity_id",
        )?;
        let ids = stmt
            .query_map([], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    // ── Snapshots ──────────────────────────────────────────────

    /// Persist entity, facts and reasons atomically.
    pub fn insert_snapshot(&self, s: &SignalSnapshot) -> EngineResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        self.upsert_entity(&s.entity)?;
        let f = &s.facts;
        self.conn.execute(
            &format!(
                "INSERT INTO fact_snapshot (entity_id, {FACT_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11,
                         ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21)"
            ),
            params![
                s.entity.entity_id,
                s.snapshot_id,
                to_sql_time(&s.captured_at),
                s.window_days,
                f.total_volume,
                opt_sql_int(f.txn_count)?,
                f.avg_amount,
                f.std_amount,
                opt_sql_int(f.max_daily_txn_count)?,
                f.max_daily_volume,
                f.avs_failure_rate,
                f.cvv_failure_rate,
                f.high_risk_flag_rate,
                opt_sql_int(f.active_days)?,
                f.off_hours_ratio,
                f.weekend_ratio,
                opt_sql_int(f.adverse_event_count)?,
                f.adverse_event_rate,
                opt_sql_int(f.failed_transfers_recent)?,
                f.unfulfilled_amount,
                opt_sql_int(f.unfulfilled_count)?,
            ],
        )?;
        for reason in &s.reasons {
            self.conn.execute(
                "INSERT INTO event_reason (snapshot_id, reason_code, occurrence_count)
                 VALUES (?1, ?2, ?3)",
                params![s.snapshot_id, reason.reason_code, to_sql_int(reason.count)?],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Most recent snapshot for an entity, or None if it has none.
    pub fn latest_snapshot(&self, entity_id: &str) -> EngineResult<Option<SignalSnapshot>> {
        let Some(entity) = self.get_entity(entity_id)? else {
            return Ok(None);
        };
        let facts = self
            .conn
            .query_row(
                &format!(
                    "SELECT {FACT_COLUMNS} FROM fact_snapshot
                     WHERE entity_id = ?1
                     ORDER BY captured_at DESC, snapshot_id DESC LIMIT 1"
                ),
                params![entity_id],
                read_fact_row,
            )
            .optional()?;
        let Some((snapshot_id, captured_at, window_days, facts)) = facts else {
            return Ok(None);
        };
        let reasons = self.reasons_for_snapshot(&snapshot_id)?;
        Ok(Some(SignalSnapshot {
            snapshot_id,
            captured_at,
            window_days,
            entity,
            facts,
            reasons,
        }))
    }

    pub fn reasons_for_snapshot(&self, snapshot_id: &str) -> EngineResult<Vec<EventReason>> {
        let mut stmt = self.conn.prepare(
            "SELECT reason_code, occurrence_count FROM event_reason
             WHERE snapshot_id = ?1 ORDER BY id ASC",
        )?;
        let reasons = stmt
            .query_map(params![snapshot_id], |r| {
                let count: Option<u64> = from_sql_int(1, Some(r.get(1)?))?;
                Ok(EventReason {
                    reason_code: r.get(0)?,
                    count:       count.unwrap_or_default(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(reasons)
    }

    // ── Test / summary helpers ────────────────────────────────────────

    pub fn snapshot_count(&self) -> EngineResult<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM fact_snapshot", [], |row| row.get(0))?;
        Ok(count)
    }
}

type FactRow = (String, chrono::DateTime<chrono::Utc>, u32, WindowedFactSet);

fn read_fact_row(r: &Row<'_>) -> rusqlite::Result<FactRow> {
    let facts = WindowedFactSet {
        total_volume:            r.get(3)?,
        txn_count:               from_sql_int(4, r.get(4)?)?,
        avg_amount:              r.get(5)?,
        std_amount:              r.get(6)?,
        max_daily_txn_count:     from_sql_int(7, r.get(7)?)?,
        max_daily_volume:        r.get(8)?,
        avs_failure_rate:        r.get(9)?,
        cvv_failure_rate:        r.get(10)?,
        high_risk_flag_rate:     r.get(11)?,
        active_days:             from_sql_int(12, r.get(12)?)?,
        off_hours_ratio:         r.get(13)?,
        weekend_ratio:           r.get(14)?,
        adverse_event_count:     from_sql_int(15, r.get(15)?)?,
        adverse_event_rate:      r.get(16)?,
        failed_transfers_recent: from_sql_int(17, r.get(17)?)?,
        unfulfilled_amount:      r.get(18)?,
        unfulfilled_count:       from_sql_int(19, r.get(19)?)?,
    };
    Ok((r.get(0)?, from_sql_time(1, r.get(1)?)?, r.get(2)?, facts))
}
