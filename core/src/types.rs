//! Shared primitive types used across the engine.

/// A stable, unique identifier for a scored merchant account.
pub type EntityId = String;

/// Identifier of one point-in-time read from the signal store.
pub type SnapshotId = String;

/// The canonical batch run identifier.
pub type RunId = String;

/// A categorical adverse-event reason (e.g. a dispute reason code).
pub type ReasonCode = String;

/// Score produced by a single risk factor. Always within `0..=MAX_FACTOR_SCORE`.
pub type FactorScore = u8;

pub const MAX_FACTOR_SCORE: FactorScore = 3;
