//! reserve-runner: headless batch runner for the reserve engine.
//!
//! Usage:
//!   reserve-runner --db risk.db --data-dir ./data
//!   reserve-runner --demo 500 --seed 7 --workers 4
//!   reserve-runner --db risk.db --entity m-000012
//!   reserve-runner --decision-table

use anyhow::{Context, Result};
use chrono::Utc;
use reserve_core::{
    composite::RiskTier,
    config::{EngineConfig, MissingFactPolicy},
    engine::{BatchSummary, ScoringEngine},
    reserve::DecisionRow,
    signal_store::SignalStore,
    store::RiskStore,
    synthetic::SyntheticPopulation,
};
use std::env;

#[derive(serde::Serialize)]
struct RunReport<'a> {
    summary:     &'a BatchSummary,
    tier_counts: Vec<(RiskTier, i64)>,
}

#[derive(serde::Serialize)]
struct DecisionTable {
    config_version: String,
    rows:           Vec<DecisionRow>,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let demo = parse_arg(&args, "--demo", 0usize);
    let workers = parse_arg(&args, "--workers", 0usize);
    let json = args.iter().any(|a| a == "--json");
    let fail_missing = args.iter().any(|a| a == "--fail-missing");
    let db = str_arg(&args, "--db").unwrap_or(":memory:");
    let data_dir = str_arg(&args, "--data-dir").unwrap_or("./data");
    let entity = str_arg(&args, "--entity");

    let mut config = EngineConfig::load(data_dir)
        .with_context(|| format!("loading engine config from {data_dir}"))?;
    if workers > 0 {
        config.workers = Some(workers);
    }
    if fail_missing {
        config.missing_fact_policy = MissingFactPolicy::FailEntity;
    }
    let engine = ScoringEngine::new(config)?;

    if args.iter().any(|a| a == "--decision-table") {
        let table = DecisionTable {
            config_version: engine.config().version.clone(),
            rows:           engine.reserve_recommender().decision_table(),
        };
        println!("{}", serde_json::to_string_pretty(&table)?);
        return Ok(());
    }

    if !json {
        println!("reserve-runner");
        println!("  config:    {}", engine.config().version);
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!("  workers:   {}", engine.config().worker_count());
        if demo > 0 {
            println!("  demo:      {demo} merchants (seed {seed})");
        }
        println!();
    }

    // :memory: becomes a named shared-memory database so a reopened
    // connection sees the same tables.
    let db_effective: String = if db == ":memory:" {
        format!("file:reserverun_{}?mode=memory&cache=shared", epoch_secs())
    } else {
        db.to_string()
    };
    let store = RiskStore::open(&db_effective)?;
    store.migrate()?;

    if demo > 0 {
        let population = SyntheticPopulation::new(seed, demo, Utc::now())
            .with_window_days(engine.config().window_days)
            .with_missing_fact_rate(parse_arg(&args, "--missing-rate", 0.0f64))
            .generate();
        for snapshot in &population {
            store.insert_snapshot(snapshot)?;
        }
        log::info!("Seeded {} synthetic merchants", population.len());
    }

    let run_id = str_arg(&args, "--run-id")
        .map(str::to_string)
        .unwrap_or_else(|| format!("run-{}-{}", seed, epoch_secs()));
    let shared = store.into_shared();

    if let Some(entity_id) = entity {
        let record = engine.score_entity(&run_id, &shared as &dyn SignalStore, entity_id)?;
        lock(&shared)?.insert_recommendation(&record)?;
        println!("{}", serde_json::to_string_pretty(&record)?);
        return Ok(());
    }

    let outcome = engine.run_batch(&run_id, &shared, None)?;
    let store = lock(&shared)?;
    store.persist_batch(&outcome.summary, &outcome.records)?;

    if json {
        let report = RunReport {
            summary:     &outcome.summary,
            tier_counts: store.tier_counts(&run_id)?,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&store, &outcome.summary)?;
    }
    Ok(())
}

fn print_summary(store: &RiskStore, summary: &BatchSummary) -> Result<()> {
    let elapsed = summary.finished_at - summary.started_at;

    println!("=== RUN SUMMARY ===");
    println!("  run_id:     {}", summary.run_id);
    println!("  attempted:  {}", summary.attempted);
    println!("  succeeded:  {}", summary.succeeded);
    println!("  partial:    {}", summary.partial);
    println!("  failed:     {}", summary.failed);
    println!("  elapsed:    {} ms", elapsed.num_milliseconds());

    println!();
    println!("=== TIERS ===");
    for (tier, count) in store.tier_counts(&summary.run_id)? {
        println!("  {:<10} {count}", tier.as_str());
    }

    if !summary.failures.is_empty() {
        println!();
        println!("=== FAILURES (first 10) ===");
        for f in summary.failures.iter().take(10) {
            println!("  {} [{}] {}", f.entity_id, f.kind.as_str(), f.reason);
        }
    }
    Ok(())
}

fn lock(shared: &std::sync::Mutex<RiskStore>) -> Result<std::sync::MutexGuard<'_, RiskStore>> {
    shared.lock().map_err(|_| anyhow::anyhow!("store lock poisoned"))
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn epoch_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
