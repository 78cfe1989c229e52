//! SQLite persistence layer.
//!
//! RULE: Only the store module talks to the database.
//! The engine reads snapshots through the `SignalStore` trait and hands
//! finished records back here; it never executes SQL directly.

use crate::{
    error::{EngineError, EngineResult},
    signal_store::SignalStore,
    snapshot::SignalSnapshot,
    types::EntityId,
};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::sync::Mutex;

mod recommendation;
mod signals;

pub struct RiskStore {
    conn: Connection,
}

impl RiskStore {
    pub fn open(path: &str) -> EngineResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> EngineResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_recommendations.sql"))?;
        Ok(())
    }

    /// Wrap for sharing across batch workers.
    pub fn into_shared(self) -> Mutex<RiskStore> {
        Mutex::new(self)
    }
}

/// Workers share one connection; reads are short, scoring runs unlocked.
impl SignalStore for Mutex<RiskStore> {
    fn list_entities(&self) -> EngineResult<Vec<EntityId>> {
        let store = self
            .lock()
            .map_err(|_| EngineError::Other(anyhow::anyhow!("signal store lock poisoned")))?;
        store.list_entity_ids()
    }

    fn fetch(&self, entity_id: &str) -> EngineResult<SignalSnapshot> {
        let store = self
            .lock()
            .map_err(|_| EngineError::Other(anyhow::anyhow!("signal store lock poisoned")))?;
        store
            .latest_snapshot(entity_id)?
            .ok_or_else(|| EngineError::EntityNotFound { entity_id: entity_id.to_string() })
    }
}

fn to_sql_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339()
}

fn from_sql_time(idx: usize, s: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e)))
}
