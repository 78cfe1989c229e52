use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Entity '{entity_id}' is missing '{field}' required by {factor}")]
    MissingInput {
        entity_id: String,
        factor:    String,
        field:     String,
    },

    #[error("Entity '{entity_id}' snapshot covers {actual} days, engine is configured for {expected}")]
    WindowMismatch {
        entity_id: String,
        expected:  u32,
        actual:    u32,
    },

    #[error("Entity '{entity_id}' not found in signal store")]
    EntityNotFound { entity_id: String },

    #[error("Worker pool error: {0}")]
    WorkerPool(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Defects in thresholds, priority lists or decision tables.
/// Always fatal at batch start: no entity is scored under a broken config.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Ladder '{factor}' references unknown metric '{metric}'")]
    UnknownMetric { factor: String, metric: String },

    #[error("Ladder '{factor}' rung {rung} has no conditions")]
    EmptyRung { factor: String, rung: usize },

    #[error("Ladder '{factor}' rung {rung} scores {score}, above the maximum of {max}")]
    ScoreOutOfRange { factor: String, rung: usize, score: u8, max: u8 },

    #[error("Ladder '{factor}' rung {rung} compares against a non-finite value")]
    NonFiniteThreshold { factor: String, rung: usize },

    #[error("Category '{category}' scores {score}, above the maximum of {max}")]
    CategoryScoreOutOfRange { category: String, score: u8, max: u8 },

    #[error("Reason priority list is empty")]
    EmptyPriorityList,

    #[error("Reason priority list contains an empty code")]
    EmptyReasonCode,

    #[error("Reason code '{code}' appears more than once in the priority list")]
    DuplicateReasonCode { code: String },

    #[error("Tier cutoffs must be strictly ascending and positive: medium={medium}, high={high}, very_high={very_high}")]
    NonAscendingCutoffs { medium: u32, high: u32, very_high: u32 },

    #[error("Reserve band table is empty")]
    EmptyBandTable,

    #[error("Tier '{tier}' maps to band {band}, but only {len} bands are configured")]
    BandOutOfRange { tier: String, band: usize, len: usize },

    #[error("Reserve policy '{context}' is invalid: {reason}")]
    InvalidPolicy { context: String, reason: String },

    #[error("Trust bands must satisfy 0 <= low <= high: low={low}, high={high}")]
    InvalidTrustBands { low: f64, high: f64 },

    #[error("Model escalation threshold {0} must be within [0, 1]")]
    InvalidModelThreshold(f64),

    #[error("Worker count must be at least 1")]
    ZeroWorkers,
}
