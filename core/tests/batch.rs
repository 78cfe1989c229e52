//! Batch runner: bounded pool, partial failure, summary accounting.

mod common;

use common::{as_of, clean_snapshot, engine, engine_with, risky_snapshot};
use reserve_core::{
    config::{EngineConfig, MissingFactPolicy},
    engine::FailureKind,
    signal_store::{InMemorySignalStore, SignalStore},
    synthetic::SyntheticPopulation,
};

fn mixed_store(n: usize) -> InMemorySignalStore {
    (0..n)
        .map(|i| {
            let id = format!("m-{i:04}");
            if i % 3 == 0 { risky_snapshot(&id) } else { clean_snapshot(&id) }
        })
        .collect()
}

/// One unreadable entity must not sink the batch.
#[test]
fn missing_entity_is_recorded_and_batch_continues() {
    let engine = engine();
    let store = mixed_store(20);
    let mut ids = store.list_entities().unwrap();
    ids.insert(7, "m-ghost".to_string());

    let outcome = engine.run_batch("run-ghost", &store, Some(&ids)).unwrap();
    let s = &outcome.summary;

    assert_eq!(s.attempted, 21);
    assert_eq!(s.succeeded, 20);
    assert_eq!(s.failed, 1);
    assert_eq!(s.failures[0].entity_id, "m-ghost");
    assert_eq!(s.failures[0].kind, FailureKind::Fetch);
    assert_eq!(outcome.records.len(), 20);
}

/// Records come back in request order whatever the worker count.
#[test]
fn records_follow_request_order() {
    let store = mixed_store(40);
    let ids = store.list_entities().unwrap();
    for workers in [1, 3, 8] {
        let mut config = EngineConfig::default_test();
        config.workers = Some(workers);
        let outcome = engine_with(config).run_batch("run-order", &store, None).unwrap();
        let got: Vec<&str> = outcome.records.iter().map(|r| r.entity_id.as_str()).collect();
        let want: Vec<&str> = ids.iter().map(String::as_str).collect();
        assert_eq!(got, want, "order broke with {workers} workers");
    }
}

/// Default-and-flag: a missing fact marks the record partial, not failed.
#[test]
fn default_and_flag_marks_partial() {
    let mut snap = clean_snapshot("m-gappy");
    snap.facts.avg_amount = None;
    let store: InMemorySignalStore = [snap, clean_snapshot("m-full")].into_iter().collect();

    let outcome = engine().run_batch("run-partial", &store, None).unwrap();
    assert_eq!(outcome.summary.succeeded, 2);
    assert_eq!(outcome.summary.partial, 1);
    assert_eq!(outcome.summary.failed, 0);

    let gappy = outcome.records.iter().find(|r| r.entity_id == "m-gappy").unwrap();
    assert!(gappy.partial);
    assert_eq!(gappy.missing_inputs.len(), 1);
    assert_eq!(gappy.missing_inputs[0].factor, "amount_pattern");
    assert_eq!(gappy.missing_inputs[0].field, "avg_amount");
    assert_eq!(gappy.factor_scores.amount_pattern, 0);
}

/// Fail-entity: the same gap becomes a per-entity failure naming the input.
#[test]
fn fail_entity_policy_records_missing_input() {
    let mut config = EngineConfig::default_test();
    config.missing_fact_policy = MissingFactPolicy::FailEntity;
    let mut snap = clean_snapshot("m-gappy");
    snap.facts.weekend_ratio = None;
    let store: InMemorySignalStore = [snap, clean_snapshot("m-full")].into_iter().collect();

    let outcome = engine_with(config).run_batch("run-strict", &store, None).unwrap();
    assert_eq!(outcome.summary.succeeded, 1);
    assert_eq!(outcome.summary.failed, 1);
    let failure = &outcome.summary.failures[0];
    assert_eq!(failure.kind, FailureKind::MissingInput);
    assert!(failure.reason.contains("weekend_ratio"), "{}", failure.reason);
    assert!(failure.reason.contains("timing"), "{}", failure.reason);
}

/// Unknown trust is a reserve-side gap under the same policy.
#[test]
fn unknown_trust_defaults_to_medium_and_flags() {
    let mut snap = clean_snapshot("m-anon");
    snap.entity.trust_category = None;
    snap.entity.trust_score = None;
    let store: InMemorySignalStore = [snap].into_iter().collect();

    let outcome = engine().run_batch("run-anon", &store, None).unwrap();
    let record = &outcome.records[0];
    assert!(record.partial);
    assert_eq!(record.audit.trust_used, reserve_core::entity::TrustCategory::Medium);
    assert!(record.missing_inputs.iter().any(|m| m.field == "trust_signal"));
}

/// NaN rates and volume on a young merchant flag the record partial
/// instead of scoring the affected factors as clean.
#[test]
fn non_finite_facts_mark_partial() {
    let mut snap = clean_snapshot("m-nan");
    snap.entity.account_age_days = Some(5);
    snap.facts.avs_failure_rate = Some(f64::NAN);
    snap.facts.cvv_failure_rate = Some(f64::NAN);
    snap.facts.total_volume = Some(f64::NAN);
    let store: InMemorySignalStore = [snap].into_iter().collect();

    let outcome = engine().run_batch("run-nan", &store, None).unwrap();
    assert_eq!(outcome.summary.partial, 1);
    let record = &outcome.records[0];
    assert!(record.partial);
    let missing: Vec<(&str, &str)> = record
        .missing_inputs
        .iter()
        .map(|m| (m.factor.as_str(), m.field.as_str()))
        .collect();
    assert!(missing.contains(&("verification_failure", "avs_failure_rate")), "{missing:?}");
    assert!(missing.contains(&("age_activity", "total_volume")), "{missing:?}");
}

/// A NaN trust score is an unknown trust signal, not a Medium merchant.
#[test]
fn nan_trust_score_is_unknown_trust() {
    let mut snap = clean_snapshot("m-nantrust");
    snap.entity.trust_category = None;
    snap.entity.trust_score = Some(f64::NAN);
    let store: InMemorySignalStore = [snap].into_iter().collect();

    let outcome = engine().run_batch("run-nantrust", &store, None).unwrap();
    let record = &outcome.records[0];
    assert!(record.partial);
    assert!(record.missing_inputs.iter().any(|m| m.field == "trust_signal"));

    let mut config = EngineConfig::default_test();
    config.missing_fact_policy = MissingFactPolicy::FailEntity;
    let outcome = engine_with(config).run_batch("run-nantrust", &store, None).unwrap();
    assert_eq!(outcome.summary.failed, 1);
    assert_eq!(outcome.summary.failures[0].kind, FailureKind::MissingInput);
}

/// Facts aggregated over another window are refused per entity.
#[test]
fn window_mismatch_fails_only_that_entity() {
    let mut short = clean_snapshot("m-30d");
    short.window_days = 30;
    let store: InMemorySignalStore = [short, clean_snapshot("m-90d"), risky_snapshot("m-risky")]
        .into_iter()
        .collect();

    let outcome = engine().run_batch("run-window", &store, None).unwrap();
    let s = &outcome.summary;
    assert_eq!(s.attempted, 3);
    assert_eq!(s.succeeded, 2);
    assert_eq!(s.failed, 1);
    assert_eq!(s.failures[0].entity_id, "m-30d");
    assert_eq!(s.failures[0].kind, FailureKind::WindowMismatch);
    assert!(s.failures[0].reason.contains("30"), "{}", s.failures[0].reason);
    assert!(outcome.records.iter().all(|r| r.window_days == 90));
}

/// Summary counts always add up on a synthetic population with gaps.
#[test]
fn summary_counts_are_consistent() {
    let population = SyntheticPopulation::new(11, 300, as_of())
        .with_missing_fact_rate(0.05)
        .generate();
    let store: InMemorySignalStore = population.into_iter().collect();

    let outcome = engine().run_batch("run-synth", &store, None).unwrap();
    let s = &outcome.summary;
    assert_eq!(s.attempted, 300);
    assert_eq!(s.succeeded + s.failed, s.attempted);
    assert_eq!(s.succeeded, outcome.records.len());
    assert_eq!(s.partial, outcome.records.iter().filter(|r| r.partial).count());
    assert!(s.partial > 0, "a 5% gap rate should leave some partial records");
    assert!(outcome.records.iter().all(|r| r.run_id == "run-synth"));
    assert_eq!(s.started_at, as_of());
}
