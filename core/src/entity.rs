//! Entity attributes and windowed facts as supplied by the signal store.
//!
//! RULE: `None` means *unknown*, never zero. Scorers must not coerce a
//! missing fact into 0 without going through the missing-input policy.

use crate::types::{EntityId, ReasonCode};
use serde::{Deserialize, Serialize};

/// The merchant account being scored. Read-only from the engine's side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id:        EntityId,
    pub account_age_days: Option<u32>,
    pub category:         Option<String>,
    pub country:          Option<String>,
    pub trust_score:      Option<f64>,
    pub trust_category:   Option<TrustCategory>,
    /// Latest externally computed predictive-model score, in [0, 1].
    pub model_score:      Option<f64>,
}

impl Entity {
    /// Lower-cased category used for all category lookups.
    pub fn normalized_category(&self) -> Option<String> {
        self.category
            .as_deref()
            .map(|c| c.trim().to_ascii_lowercase())
            .filter(|c| !c.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustCategory {
    Low,
    Medium,
    High,
}

impl TrustCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low    => "low",
            Self::Medium => "medium",
            Self::High   => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low"    => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high"   => Some(Self::High),
            _        => None,
        }
    }
}

/// Pre-aggregated behaviour of one entity over one lookback window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowedFactSet {
    pub total_volume:            Option<f64>,
    pub txn_count:               Option<u64>,
    pub avg_amount:              Option<f64>,
    pub std_amount:              Option<f64>,
    pub max_daily_txn_count:     Option<u64>,
    pub max_daily_volume:        Option<f64>,
    pub avs_failure_rate:        Option<f64>,
    pub cvv_failure_rate:        Option<f64>,
    pub high_risk_flag_rate:     Option<f64>,
    pub active_days:             Option<u32>,
    pub off_hours_ratio:         Option<f64>,
    pub weekend_ratio:           Option<f64>,
    pub adverse_event_count:     Option<u64>,
    /// Count-based: adverse events / transactions.
    pub adverse_event_rate:      Option<f64>,
    pub failed_transfers_recent: Option<u32>,
    pub unfulfilled_amount:      Option<f64>,
    pub unfulfilled_count:       Option<u64>,
}

impl WindowedFactSet {
    /// Canonical adverse-event rate: the supplied count-based rate, or
    /// events / transactions when only the counts are known. A non-finite
    /// supplied rate counts as not supplied.
    pub fn count_based_adverse_rate(&self) -> Option<f64> {
        if let Some(rate) = self.adverse_event_rate.filter(|r| r.is_finite()) {
            return Some(rate);
        }
        match (self.adverse_event_count, self.txn_count) {
            (Some(_), Some(0))     => Some(0.0),
            (Some(events), Some(txns)) => Some(events as f64 / txns as f64),
            _ => None,
        }
    }
}

/// One `(reason_code, occurrence_count)` pair for an entity's window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventReason {
    pub reason_code: ReasonCode,
    pub count:       u64,
}

impl EventReason {
    pub fn new(reason_code: impl Into<ReasonCode>, count: u64) -> Self {
        Self { reason_code: reason_code.into(), count }
    }
}
