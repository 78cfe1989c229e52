//! Property tests for the pure scoring stages.

mod common;

use common::clean_snapshot;
use proptest::prelude::*;
use reserve_core::{
    composite::{RiskTier, TierCutoffs},
    config::EngineConfig,
    entity::{EventReason, TrustCategory},
    reason::{DominantReason, ReasonResolver},
    reserve::{ReserveInputs, ReserveRecommender, ReserveType},
    types::MAX_FACTOR_SCORE,
};

const CODES: &[&str] = &[
    "fraudulent",
    "general",
    "duplicate_charge",
    "incorrect_amount",
    "custom_a",
    "custom_b",
];

fn reason_list() -> impl Strategy<Value = Vec<EventReason>> {
    prop::collection::vec((0..CODES.len(), 0u64..20), 0..8)
        .prop_map(|v| v.into_iter().map(|(i, n)| EventReason::new(CODES[i], n)).collect())
}

fn tier() -> impl Strategy<Value = RiskTier> {
    prop::sample::select(RiskTier::ALL.to_vec())
}

fn trust() -> impl Strategy<Value = TrustCategory> {
    prop::sample::select(vec![TrustCategory::Low, TrustCategory::Medium, TrustCategory::High])
}

// ── Reason resolver ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn resolver_picks_a_max_count_input(reasons in reason_list()) {
        let r = ReasonResolver::new(&EngineConfig::default_test().reason_priority).unwrap();
        let mut totals = std::collections::HashMap::new();
        for e in &reasons {
            *totals.entry(e.reason_code.clone()).or_insert(0u64) += e.count;
        }
        match r.resolve(&reasons) {
            DominantReason::NoEvents => prop_assert!(totals.values().all(|n| *n == 0)),
            DominantReason::Reason(code) => {
                let max = totals.values().copied().max().unwrap_or(0);
                prop_assert_eq!(totals.get(&code).copied(), Some(max));
            }
        }
    }

    #[test]
    fn resolver_ignores_input_order(reasons in reason_list()) {
        let r = ReasonResolver::new(&EngineConfig::default_test().reason_priority).unwrap();
        let mut reversed = reasons.clone();
        reversed.reverse();
        prop_assert_eq!(r.resolve(&reasons), r.resolve(&reversed));
    }
}

// ── Composite tiers ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn tier_is_monotone_in_composite(a in 0u32..=18, b in 0u32..=18) {
        let cutoffs = EngineConfig::default_test().tier_cutoffs;
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(cutoffs.classify(lo) <= cutoffs.classify(hi));
    }

    #[test]
    fn any_ascending_cutoffs_are_monotone(m in 1u32..10, h in 1u32..10, v in 1u32..10, x in 0u32..40) {
        let cutoffs = TierCutoffs { medium: m, high: m + h, very_high: m + h + v };
        prop_assert!(cutoffs.validate().is_ok());
        prop_assert!(cutoffs.classify(x) <= cutoffs.classify(x + 1));
    }
}

// ── Factor scoring ──────────────────────────────────────────────────

proptest! {
    #[test]
    fn factor_scores_stay_in_range(
        age in 0u32..3000,
        burst in 0u64..500,
        avs in 0.0f64..1.0,
        cvv in 0.0f64..1.0,
        avg in 0.0f64..5000.0,
        std in 0.0f64..5000.0,
        off in 0.0f64..1.0,
        weekend in 0.0f64..1.0,
        volume in 0.0f64..1.0e6,
    ) {
        let engine = common::engine();
        let mut snap = clean_snapshot("m-prop");
        snap.entity.account_age_days = Some(age);
        snap.facts.max_daily_txn_count = Some(burst);
        snap.facts.avs_failure_rate = Some(avs);
        snap.facts.cvv_failure_rate = Some(cvv);
        snap.facts.avg_amount = Some(avg);
        snap.facts.std_amount = Some(std);
        snap.facts.off_hours_ratio = Some(off);
        snap.facts.weekend_ratio = Some(weekend);
        snap.facts.total_volume = Some(volume);

        let a = engine.evaluate(&snap).unwrap();
        let b = engine.evaluate(&snap).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert!(a.composite.composite <= 6 * MAX_FACTOR_SCORE as u32);
        prop_assert_eq!(a.composite.composite, a.inputs.scores.sum());
    }
}

// ── Reserve recommender ─────────────────────────────────────────────

proptest! {
    #[test]
    fn failed_transfer_always_at_least_rolling(
        tier in tier(),
        trust in trust(),
        model in prop::option::of(0.0f64..=1.0),
    ) {
        let r = ReserveRecommender::new(&EngineConfig::default_test().reserve);
        let rec = r.recommend(&ReserveInputs {
            tier,
            category: None,
            trust,
            model_score: model,
            failed_transfer: true,
            unfulfilled_amount: None,
        });
        prop_assert!(rec.policy.reserve_type >= ReserveType::Rolling);
        prop_assert!(rec.policy.validate("recommendation").is_ok());
    }

    #[test]
    fn percentage_never_exceeds_hundred(
        tier in tier(),
        trust in trust(),
        category in prop::sample::select(vec!["gambling", "crypto", "nutraceuticals", "grocery"]),
        exposure in prop::option::of(0.0f64..1.0e6),
    ) {
        let r = ReserveRecommender::new(&EngineConfig::default_test().reserve);
        let rec = r.recommend(&ReserveInputs {
            tier,
            category: Some(category.to_string()),
            trust,
            model_score: None,
            failed_transfer: false,
            unfulfilled_amount: exposure,
        });
        if let Some(p) = rec.policy.percentage {
            prop_assert!(p > 0.0 && p <= 100.0);
        }
        if let (Some(min), Some(e)) = (rec.policy.minimum_amount, exposure) {
            prop_assert!(min >= e);
        }
    }
}
