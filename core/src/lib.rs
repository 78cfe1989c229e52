//! reserve-core: merchant risk scoring and reserve recommendation.
//!
//! PIPELINE (fixed, per entity):
//!   1. Signal store fetch      (signal_store / store)
//!   2. Reason resolver         (reason)
//!   3. Risk factor scorer      (ladder, factor)
//!   4. Composite + classifier  (composite)
//!   5. Reserve recommender     (reserve)
//!   6. Report assembler        (report)
//!
//! The batch engine (engine) runs the pipeline for many entities on a
//! bounded worker pool.

pub mod clock;
pub mod composite;
pub mod config;
pub mod engine;
pub mod entity;
pub mod error;
pub mod factor;
pub mod ladder;
pub mod reason;
pub mod report;
pub mod reserve;
pub mod rng;
pub mod signal_store;
pub mod snapshot;
pub mod store;
pub mod synthetic;
pub mod types;
