//! Synthetic merchant population for demos and soak runs.
//!
//! Generates plausible signal snapshots from a seed. Same seed, same
//! population: every draw goes through `rng::RngStream`.
//!
//! Archetypes:
//!   established  ~70%  old accounts, steady volume, low failure rates
//!   growing      ~20%  younger accounts, moderate bursts
//!   high_risk    ~10%  very young, bursty, high failures, risky categories

use crate::{
    entity::{Entity, EventReason, TrustCategory, WindowedFactSet},
    rng::{RngStream, SeededRng},
    snapshot::SignalSnapshot,
};
use chrono::{DateTime, Utc};

const LOW_RISK_CATEGORIES: &[&str] = &["grocery", "saas", "restaurants", "apparel", "travel", "electronics"];
const HIGH_RISK_CATEGORIES: &[&str] = &["gambling", "crypto", "nutraceuticals", "ticketing", "adult_content"];
const COUNTRIES: &[&str] = &["US", "GB", "DE", "CA", "AU"];
const REASONS: &[&str] = &[
    "fraudulent",
    "unauthorized_charge",
    "product_not_received",
    "credit_not_processed",
    "duplicate_charge",
    "subscription_canceled",
    "product_unacceptable",
    "incorrect_amount",
    "general",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Archetype {
    Established,
    Growing,
    HighRisk,
}

#[derive(Debug, Clone)]
pub struct SyntheticPopulation {
    pub seed:              u64,
    pub size:              usize,
    pub window_days:       u32,
    pub as_of:             DateTime<Utc>,
    /// Probability that any single optional fact is left unknown.
    pub missing_fact_rate: f64,
}

impl SyntheticPopulation {
    pub fn new(seed: u64, size: usize, as_of: DateTime<Utc>) -> Self {
        Self { seed, size, window_days: 90, as_of, missing_fact_rate: 0.0 }
    }

    pub fn with_window_days(mut self, window_days: u32) -> Self {
        self.window_days = window_days;
        self
    }

    pub fn with_missing_fact_rate(mut self, rate: f64) -> Self {
        self.missing_fact_rate = rate;
        self
    }

    pub fn generate(&self) -> Vec<SignalSnapshot> {
        let mut profile_rng = RngStream::Profile.rng(self.seed);
        let mut facts_rng = RngStream::Facts.rng(self.seed);
        let mut reasons_rng = RngStream::Reasons.rng(self.seed);

        (0..self.size)
            .map(|i| {
                let archetype = pick_archetype(&mut profile_rng);
                let entity = self.entity(i, archetype, &mut profile_rng);
                let facts = self.facts(archetype, entity.account_age_days.unwrap_or(0), &mut facts_rng);
                let reasons = reasons_for(facts.adverse_event_count.unwrap_or(0), &mut reasons_rng);
                SignalSnapshot {
                    snapshot_id: format!("snap-{}-{i:06}", self.seed),
                    captured_at: self.as_of,
                    window_days: self.window_days,
                    entity,
                    facts,
                    reasons,
                }
            })
            .collect()
    }

    fn entity(&self, i: usize, archetype: Archetype, rng: &mut SeededRng) -> Entity {
        let (age, categories, trust_range, model_range) = match archetype {
            Archetype::Established => (rng.range_f64(180.0, 2000.0), LOW_RISK_CATEGORIES, (50.0, 100.0), (0.0, 0.3)),
            Archetype::Growing     => (rng.range_f64(30.0, 180.0), LOW_RISK_CATEGORIES, (30.0, 80.0), (0.1, 0.6)),
            Archetype::HighRisk    => (rng.range_f64(3.0, 45.0), HIGH_RISK_CATEGORIES, (0.0, 40.0), (0.4, 1.0)),
        };
        let trust_score = rng.range_f64(trust_range.0, trust_range.1);
        // A third of entities carry an explicit trust category.
        let trust_category = if rng.chance(0.33) {
            Some(match trust_score {
                s if s >= 70.0 => TrustCategory::High,
                s if s < 30.0  => TrustCategory::Low,
                _              => TrustCategory::Medium,
            })
        } else {
            None
        };
        let model_score = rng.chance(0.8).then(|| rng.range_f64(model_range.0, model_range.1));

        Entity {
            entity_id:        format!("m-{i:06}"),
            account_age_days: Some(age as u32),
            category:         rng.pick(categories).map(|c| c.to_string()),
            country:          rng.pick(COUNTRIES).map(|c| c.to_string()),
            trust_score:      Some(trust_score),
            trust_category,
            model_score,
        }
    }

    fn facts(&self, archetype: Archetype, age_days: u32, rng: &mut SeededRng) -> WindowedFactSet {
        let active_days = age_days.min(self.window_days).max(1);
        let (daily_txns, avg, cv, failure_max, skew_max, adverse_rate) = match archetype {
            Archetype::Established => (rng.pareto(5.0, 2.0), rng.range_f64(20.0, 300.0), rng.range_f64(0.4, 1.5), 0.08, 0.35, 0.004),
            Archetype::Growing     => (rng.pareto(10.0, 1.8), rng.range_f64(50.0, 700.0), rng.range_f64(0.2, 1.0), 0.25, 0.55, 0.010),
            Archetype::HighRisk    => (rng.pareto(25.0, 1.5), rng.range_f64(300.0, 2000.0), rng.range_f64(0.02, 0.4), 0.70, 0.85, 0.030),
        };
        let txn_count = (daily_txns * active_days as f64).round() as u64;
        let max_daily_txn_count = (daily_txns * rng.range_f64(1.5, 4.0)).round() as u64;
        let total_volume = txn_count as f64 * avg;
        let adverse_event_count = (txn_count as f64 * rng.range_f64(0.0, adverse_rate)).round() as u64;
        let adverse_event_rate = if txn_count > 0 { adverse_event_count as f64 / txn_count as f64 } else { 0.0 };
        let failed_transfers = if rng.chance(0.05) { 1 + rng.next_u64_below(3) as u32 } else { 0 };
        let unfulfilled_count = rng.next_u64_below(txn_count / 20 + 1);

        let mut maybe = |v: f64| (!rng.chance(self.missing_fact_rate)).then_some(v);
        WindowedFactSet {
            total_volume:            Some(total_volume),
            txn_count:               Some(txn_count),
            avg_amount:              maybe(avg),
            std_amount:              maybe(avg * cv),
            max_daily_txn_count:     Some(max_daily_txn_count),
            max_daily_volume:        Some(max_daily_txn_count as f64 * avg),
            avs_failure_rate:        maybe(failure_max * 0.5),
            cvv_failure_rate:        maybe(failure_max * 0.8),
            high_risk_flag_rate:     maybe(failure_max * 0.3),
            active_days:             Some(active_days),
            off_hours_ratio:         maybe(skew_max * 0.9),
            weekend_ratio:           maybe(skew_max * 0.6),
            adverse_event_count:     Some(adverse_event_count),
            adverse_event_rate:      Some(adverse_event_rate),
            failed_transfers_recent: Some(failed_transfers),
            unfulfilled_amount:      Some(unfulfilled_count as f64 * avg),
            unfulfilled_count:       Some(unfulfilled_count),
        }
    }
}

fn pick_archetype(rng: &mut SeededRng) -> Archetype {
    let roll = rng.next_f64();
    if roll < 0.70 {
        Archetype::Established
    } else if roll < 0.90 {
        Archetype::Growing
    } else {
        Archetype::HighRisk
    }
}

/// Spread `total` adverse events over a few reason codes.
fn reasons_for(total: u64, rng: &mut SeededRng) -> Vec<EventReason> {
    let mut remaining = total;
    let mut reasons = Vec::new();
    while remaining > 0 && reasons.len() < 4 {
        let Some(code) = rng.pick(REASONS) else { break };
        let take = if reasons.len() == 3 { remaining } else { 1 + rng.next_u64_below(remaining) };
        reasons.push(EventReason::new(*code, take));
        remaining -= take;
    }
    reasons
}
