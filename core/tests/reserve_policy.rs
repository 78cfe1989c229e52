//! Reserve decision table: totality, monotonicity and overrides.

mod common;

use common::engine;
use reserve_core::{
    composite::RiskTier,
    config::EngineConfig,
    entity::TrustCategory,
    reserve::{ReserveInputs, ReserveOverride, ReservePolicy, ReserveRecommender, ReserveType, TrustShift},
};

fn recommender() -> ReserveRecommender {
    ReserveRecommender::new(&EngineConfig::default_test().reserve)
}

fn inputs(tier: RiskTier, trust: TrustCategory) -> ReserveInputs {
    ReserveInputs {
        tier,
        category: Some("grocery".into()),
        trust,
        model_score: None,
        failed_transfer: false,
        unfulfilled_amount: None,
    }
}

/// Every combination has exactly one row and a valid policy.
#[test]
fn decision_table_is_total() {
    let table = recommender().decision_table();
    assert_eq!(table.len(), 4 * 3 * 2);
    for tier in RiskTier::ALL {
        for shift in TrustShift::ALL {
            for failed in [false, true] {
                let rows: Vec<_> = table
                    .iter()
                    .filter(|r| r.tier == tier && r.shift == shift && r.failed_transfer == failed)
                    .collect();
                assert_eq!(rows.len(), 1, "{tier:?}/{shift:?}/{failed}");
                rows[0].policy.validate("row").unwrap();
            }
        }
    }
}

#[test]
fn neutral_rows_match_defaults() {
    let r = recommender();
    let expected = [
        (RiskTier::Low, ReservePolicy::none()),
        (RiskTier::Medium, ReservePolicy::fixed(2_500.0, 90)),
        (RiskTier::High, ReservePolicy::rolling(10.0, 120)),
        (RiskTier::VeryHigh, ReservePolicy::both(15.0, 5_000.0, 180)),
    ];
    for (tier, policy) in expected {
        let (_, got, floored) = r.table_policy(tier, TrustShift::Neutral, false);
        assert_eq!(got, policy, "{tier:?}");
        assert!(!floored);
    }
}

/// Trust moves at most one band and never leaves the table.
#[test]
fn trust_shift_is_bounded() {
    let r = recommender();
    assert_eq!(r.table_policy(RiskTier::Low, TrustShift::Down, false).0, 0);
    assert_eq!(r.table_policy(RiskTier::VeryHigh, TrustShift::Up, false).0, 4);
    assert_eq!(r.table_policy(RiskTier::Medium, TrustShift::Down, false).0, 1);
    assert_eq!(r.table_policy(RiskTier::Medium, TrustShift::Up, false).0, 3);
}

/// Higher tiers never get a weaker reserve for the same trust.
#[test]
fn reserve_type_is_monotone_in_tier() {
    let r = recommender();
    for trust in [TrustCategory::Low, TrustCategory::Medium, TrustCategory::High] {
        let types: Vec<ReserveType> = RiskTier::ALL
            .iter()
            .map(|t| r.recommend(&inputs(*t, trust)).policy.reserve_type)
            .collect();
        assert!(types.windows(2).all(|w| w[0] <= w[1]), "{trust:?}: {types:?}");
    }
}

/// A failed transfer floors every row at Rolling.
#[test]
fn failed_transfer_floor_applies_to_every_row() {
    for row in recommender().decision_table().iter().filter(|r| r.failed_transfer) {
        assert!(row.policy.reserve_type >= ReserveType::Rolling, "{row:?}");
    }
}

#[test]
fn failed_transfer_keeps_stronger_tier_policy() {
    let r = recommender();
    let (_, policy, floored) = r.table_policy(RiskTier::VeryHigh, TrustShift::Neutral, true);
    assert_eq!(policy.reserve_type, ReserveType::Both);
    assert!(!floored);
}

#[test]
fn category_adjustment_adds_to_percentage_only() {
    let r = recommender();
    let mut i = inputs(RiskTier::High, TrustCategory::Medium);
    i.category = Some("  Crypto ".into());
    let rec = r.recommend(&i);
    assert_eq!(rec.policy.reserve_type, ReserveType::Rolling);
    assert_eq!(rec.policy.percentage, Some(15.0));
    assert_eq!(rec.overrides, vec![ReserveOverride::CategoryAdjustment]);

    // No percentage to adjust on a Fixed band.
    let mut i = inputs(RiskTier::Medium, TrustCategory::Medium);
    i.category = Some("crypto".into());
    let rec = r.recommend(&i);
    assert_eq!(rec.policy, ReservePolicy::fixed(2_500.0, 90));
    assert!(rec.overrides.is_empty());
}

#[test]
fn trust_score_bands_fill_missing_category() {
    let engine = engine();
    let r = engine.reserve_recommender();
    let mut entity = common::clean_snapshot("m-x").entity;
    entity.trust_category = None;
    for (score, want) in [(10.0, TrustCategory::Low), (30.0, TrustCategory::Medium), (70.0, TrustCategory::High)] {
        entity.trust_score = Some(score);
        assert_eq!(r.trust_category(&entity), Some(want), "score {score}");
    }
    entity.trust_score = None;
    assert_eq!(r.trust_category(&entity), None);
}

/// Invalid reserve tables are rejected before any scoring.
#[test]
fn broken_band_mapping_fails_engine_construction() {
    let mut config = EngineConfig::default_test();
    config.reserve.tier_bands.very_high = 9;
    assert!(reserve_core::engine::ScoringEngine::new(config).is_err());

    let mut config = EngineConfig::default_test();
    config.reserve.failed_transfer_floor = ReservePolicy::time_delay(7);
    assert!(reserve_core::engine::ScoringEngine::new(config).is_err());
}
