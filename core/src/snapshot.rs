//! Signal snapshot: one point-in-time read from the signal store.
//!
//! A snapshot carries everything needed to reproduce a recommendation:
//! the entity attributes, the windowed facts and the reason records,
//! tagged with the store's snapshot identifier.

use crate::{
    entity::{Entity, EventReason, WindowedFactSet},
    types::SnapshotId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSnapshot {
    pub snapshot_id: SnapshotId,
    pub captured_at: DateTime<Utc>,
    pub window_days: u32,
    pub entity:      Entity,
    pub facts:       WindowedFactSet,
    pub reasons:     Vec<EventReason>,
}
