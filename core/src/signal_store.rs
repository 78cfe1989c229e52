//! Signal store seam.
//!
//! RULE: the engine never reads raw events. It asks a `SignalStore` for one
//! point-in-time snapshot per entity and scores that snapshot only.
//!
//! Implementations:
//!   - `InMemorySignalStore`: tests and embedding callers
//!   - `RiskStore` (store module): SQLite-backed, behind a `Mutex`

use crate::{
    error::{EngineError, EngineResult},
    snapshot::SignalSnapshot,
    types::EntityId,
};
use std::collections::BTreeMap;

/// Read-only source of windowed facts. Shared across batch workers.
pub trait SignalStore: Send + Sync {
    /// Every entity the store can supply facts for, in stable order.
    fn list_entities(&self) -> EngineResult<Vec<EntityId>>;

    /// One snapshot of the entity's attributes, facts and reason records.
    fn fetch(&self, entity_id: &str) -> EngineResult<SignalSnapshot>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemorySignalStore {
    snapshots: BTreeMap<EntityId, SignalSnapshot>,
}

impl InMemorySignalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, snapshot: SignalSnapshot) {
        self.snapshots.insert(snapshot.entity.entity_id.clone(), snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

impl FromIterator<SignalSnapshot> for InMemorySignalStore {
    fn from_iter<I: IntoIterator<Item = SignalSnapshot>>(iter: I) -> Self {
        let mut store = Self::new();
        for snapshot in iter {
            store.insert(snapshot);
        }
        store
    }
}

impl SignalStore for InMemorySignalStore {
    fn list_entities(&self) -> EngineResult<Vec<EntityId>> {
        Ok(self.snapshots.keys().cloned().collect())
    }

    fn fetch(&self, entity_id: &str) -> EngineResult<SignalSnapshot> {
        self.snapshots
            .get(entity_id)
            .cloned()
            .ok_or_else(|| EngineError::EntityNotFound { entity_id: entity_id.to_string() })
    }
}
