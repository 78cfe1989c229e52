use crate::{
    composite::TierCutoffs,
    error::ConfigError,
    factor::{FactorLadders, HistoricalAdverse, RiskFactor},
    ladder::{Comparison::*, Condition, Rung, ThresholdLadder},
    reason::ReasonResolver,
    reserve::{ReserveConfig, ReservePolicy, TierBands, TrustBands},
    types::{FactorScore, ReasonCode, MAX_FACTOR_SCORE},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How unknown facts are handled. One policy per batch, applied to every
/// factor and to the reserve recommender's inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingFactPolicy {
    /// The entity fails with an error naming the missing factor and field.
    FailEntity,
    /// The missing input scores 0 and the record is flagged partial.
    #[default]
    DefaultAndFlag,
}

#[derive(Debug, Clone, Deserialize)]
struct EngineFile {
    version: String,
    window_days: u32,
    #[serde(default)]
    workers: Option<usize>,
    #[serde(default)]
    missing_fact_policy: MissingFactPolicy,
}

#[derive(Debug, Clone, Deserialize)]
struct CategoryRiskFile {
    categories: HashMap<String, FactorScore>,
}

#[derive(Debug, Clone, Deserialize)]
struct ReasonPriorityFile {
    /// Most severe first.
    priority: Vec<ReasonCode>,
}

/// Everything a batch run is judged by. Loaded once, validated once,
/// then shared read-only for the whole batch.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Carried onto every record so audits can tell which rules applied.
    pub version:             String,
    pub window_days:         u32,
    /// Worker threads for batch scoring. `None` uses available parallelism.
    pub workers:             Option<usize>,
    pub missing_fact_policy: MissingFactPolicy,
    pub ladders:             FactorLadders,
    pub category_risk:       HashMap<String, FactorScore>,
    pub reason_priority:     Vec<ReasonCode>,
    pub tier_cutoffs:        TierCutoffs,
    pub reserve:             ReserveConfig,
}

impl EngineConfig {
    /// Load from the data/ directory.
    /// In tests, use EngineConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let engine: EngineFile = read_json(data_dir, "engine.json")?;
        let ladders: FactorLadders = read_json(data_dir, "risk/factor_ladders.json")?;
        let categories: CategoryRiskFile = read_json(data_dir, "risk/category_risk.json")?;
        let priority: ReasonPriorityFile = read_json(data_dir, "risk/reason_priority.json")?;
        let tier_cutoffs: TierCutoffs = read_json(data_dir, "risk/tier_cutoffs.json")?;
        let reserve: ReserveConfig = read_json(data_dir, "reserve/reserve_policy.json")?;

        let config = Self {
            version:             engine.version,
            window_days:         engine.window_days,
            workers:             engine.workers,
            missing_fact_policy: engine.missing_fact_policy,
            ladders,
            category_risk:       categories.categories,
            reason_priority:     priority.priority,
            tier_cutoffs,
            reserve,
        };
        config.validate()?;
        log::info!("Loaded engine config version {} from {data_dir}", config.version);
        Ok(config)
    }

    /// Fail-fast checks. A config that fails here never scores an entity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ladders.validate()?;
        for (category, score) in &self.category_risk {
            if *score > MAX_FACTOR_SCORE {
                return Err(ConfigError::CategoryScoreOutOfRange {
                    category: category.clone(),
                    score:    *score,
                    max:      MAX_FACTOR_SCORE,
                });
            }
        }
        ReasonResolver::new(&self.reason_priority)?;
        self.tier_cutoffs.validate()?;
        self.reserve.validate()?;
        if self.workers == Some(0) {
            return Err(ConfigError::ZeroWorkers);
        }
        Ok(())
    }

    /// Effective worker count for the batch pool.
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Config with hardcoded defaults for use in unit tests.
    /// Mirrors the files shipped under data/.
    pub fn default_test() -> Self {
        let ladders = FactorLadders {
            velocity: ThresholdLadder::new(vec![
                Rung {
                    when:  vec![
                        Condition::new("max_daily_txn_count", Gte, 50.0),
                        Condition::new("account_age_days", Lt, 30.0),
                    ],
                    score: 3,
                },
                Rung {
                    when:  vec![
                        Condition::new("max_daily_txn_count", Gte, 30.0),
                        Condition::new("account_age_days", Lt, 90.0),
                    ],
                    score: 2,
                },
                Rung { when: vec![Condition::new("max_daily_txn_count", Gte, 100.0)], score: 1 },
            ]),
            verification_failure: ThresholdLadder::new(vec![
                Rung { when: vec![Condition::new("max_failure_rate", Gte, 0.50)], score: 3 },
                Rung { when: vec![Condition::new("max_failure_rate", Gte, 0.25)], score: 2 },
                Rung { when: vec![Condition::new("max_failure_rate", Gte, 0.10)], score: 1 },
            ]),
            amount_pattern: ThresholdLadder::new(vec![
                Rung {
                    when:  vec![
                        Condition::new("avg_amount", Gte, 1000.0),
                        Condition::new("amount_cv", Lt, 0.10),
                    ],
                    score: 3,
                },
                Rung { when: vec![Condition::new("avg_amount", Gte, 1000.0)], score: 2 },
                Rung {
                    when:  vec![
                        Condition::new("avg_amount", Gte, 500.0),
                        Condition::new("amount_cv", Lt, 0.20),
                    ],
                    score: 1,
                },
            ]),
            age_activity: ThresholdLadder::new(vec![
                Rung {
                    when:  vec![
                        Condition::new("account_age_days", Lt, 14.0),
                        Condition::new("total_volume", Gte, 10_000.0),
                    ],
                    score: 3,
                },
                Rung {
                    when:  vec![
                        Condition::new("account_age_days", Lt, 30.0),
                        Condition::new("total_volume", Gte, 25_000.0),
                    ],
                    score: 2,
                },
                Rung {
                    when:  vec![
                        Condition::new("account_age_days", Lt, 60.0),
                        Condition::new("total_volume", Gte, 50_000.0),
                    ],
                    score: 1,
                },
            ]),
            timing: ThresholdLadder::new(vec![
                Rung { when: vec![Condition::new("max_skew_ratio", Gte, 0.70)], score: 3 },
                Rung { when: vec![Condition::new("max_skew_ratio", Gte, 0.50)], score: 2 },
                Rung { when: vec![Condition::new("max_skew_ratio", Gte, 0.35)], score: 1 },
            ]),
            historical_adverse: ThresholdLadder::new(vec![
                Rung {
                    when:  vec![
                        Condition::new("adverse_event_rate", Gte, 0.01),
                        Condition::new("dominant_reason_severity", Gte, 9.0),
                    ],
                    score: 3,
                },
                Rung { when: vec![Condition::new("adverse_event_rate", Gte, 0.01)], score: 2 },
                Rung { when: vec![Condition::new("adverse_event_count", Gte, 1.0)], score: 1 },
            ]),
        };

        let category_risk = [
            ("gambling", 3),
            ("crypto", 3),
            ("adult_content", 3),
            ("nutraceuticals", 2),
            ("ticketing", 2),
            ("travel", 1),
            ("electronics", 1),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let reason_priority = [
            "fraudulent",
            "unauthorized_charge",
            "product_not_received",
            "credit_not_processed",
            "duplicate_charge",
            "subscription_canceled",
            "product_unacceptable",
            "incorrect_amount",
            "bank_cannot_process",
            "general",
        ]
        .into_iter()
        .map(String::from)
        .collect();

        let reserve = ReserveConfig {
            bands: vec![
                ReservePolicy::none(),
                ReservePolicy::time_delay(7),
                ReservePolicy::fixed(2_500.0, 90),
                ReservePolicy::rolling(10.0, 120),
                ReservePolicy::both(15.0, 5_000.0, 180),
            ],
            tier_bands: TierBands { low: 0, medium: 2, high: 3, very_high: 4 },
            trust_bands: TrustBands { low: 30.0, high: 70.0 },
            model_escalation_threshold: 0.80,
            failed_transfer_floor: ReservePolicy::rolling(10.0, 90),
            category_adjustments: [("gambling", 5.0), ("crypto", 5.0), ("nutraceuticals", 2.5)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        };

        Self {
            version: "test".into(),
            window_days: 90,
            workers: Some(2),
            missing_fact_policy: MissingFactPolicy::DefaultAndFlag,
            ladders,
            category_risk,
            reason_priority,
            tier_cutoffs: TierCutoffs { medium: 3, high: 6, very_high: 10 },
            reserve,
        }
    }

    /// Factor names that take part in the composite, in scoring order.
    pub fn composite_factor_names() -> Vec<&'static str> {
        RiskFactor::ALL.iter().map(|f| f.name()).collect()
    }

    pub fn historical_factor_name() -> &'static str {
        HistoricalAdverse::NAME
    }
}

fn read_json<T: serde::de::DeserializeOwned>(data_dir: &str, rel: &str) -> anyhow::Result<T> {
    let path = format!("{data_dir}/{rel}");
    let content = std::fs::read_to_string(&path)
        .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    serde_json::from_str(&content).map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))
}
