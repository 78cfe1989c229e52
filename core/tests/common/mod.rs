//! Shared fixtures for integration tests.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use reserve_core::{
    clock::FixedClock,
    config::EngineConfig,
    engine::ScoringEngine,
    entity::{Entity, EventReason, TrustCategory, WindowedFactSet},
    snapshot::SignalSnapshot,
};
use std::sync::Arc;

pub fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()
}

pub fn engine() -> ScoringEngine {
    engine_with(EngineConfig::default_test())
}

pub fn engine_with(config: EngineConfig) -> ScoringEngine {
    ScoringEngine::with_clock(config, Arc::new(FixedClock(as_of()))).expect("valid config")
}

/// Old, steady, low-risk merchant with no adverse history.
pub fn clean_snapshot(entity_id: &str) -> SignalSnapshot {
    SignalSnapshot {
        snapshot_id: format!("snap-{entity_id}"),
        captured_at: as_of(),
        window_days: 90,
        entity: Entity {
            entity_id:        entity_id.to_string(),
            account_age_days: Some(400),
            category:         Some("grocery".into()),
            country:          Some("US".into()),
            trust_score:      Some(100.0),
            trust_category:   Some(TrustCategory::High),
            model_score:      Some(0.05),
        },
        facts: WindowedFactSet {
            total_volume:            Some(50_000.0),
            txn_count:               Some(600),
            avg_amount:              Some(80.0),
            std_amount:              Some(60.0),
            max_daily_txn_count:     Some(10),
            max_daily_volume:        Some(900.0),
            avs_failure_rate:        Some(0.01),
            cvv_failure_rate:        Some(0.0),
            high_risk_flag_rate:     Some(0.0),
            active_days:             Some(90),
            off_hours_ratio:         Some(0.10),
            weekend_ratio:           Some(0.20),
            adverse_event_count:     Some(0),
            adverse_event_rate:      Some(0.0),
            failed_transfers_recent: Some(0),
            unfulfilled_amount:      Some(0.0),
            unfulfilled_count:       Some(0),
        },
        reasons: vec![],
    }
}

/// Ten-day-old gambling merchant with a burst, failing checks and disputes.
pub fn risky_snapshot(entity_id: &str) -> SignalSnapshot {
    let mut s = clean_snapshot(entity_id);
    s.entity.account_age_days = Some(10);
    s.entity.category = Some("gambling".into());
    s.entity.trust_score = Some(10.0);
    s.entity.trust_category = Some(TrustCategory::Low);
    s.entity.model_score = Some(0.5);
    s.facts.total_volume = Some(12_000.0);
    s.facts.txn_count = Some(100);
    s.facts.avg_amount = Some(400.0);
    s.facts.std_amount = Some(200.0);
    s.facts.max_daily_txn_count = Some(60);
    s.facts.avs_failure_rate = Some(0.6);
    s.facts.cvv_failure_rate = Some(0.1);
    s.facts.adverse_event_count = Some(7);
    s.facts.adverse_event_rate = None;
    s.reasons = vec![EventReason::new("general", 2), EventReason::new("fraudulent", 5)];
    s
}
