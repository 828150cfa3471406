//! Benchmark runner: times `create_version` and the bulk current query per
//! strategy, then the direct-SQL baseline, and prints the report.
//!
//! Measurements cover only the operation under test; seeding and connection
//! setup are excluded.

use std::time::{Duration, Instant};

use anyhow::Result;
use strata_core::{
  record::FieldUpdate,
  store::{Predicate, VersionStore as _},
  table::TableSpec,
};
use strata_store_sqlite::{
  SqliteStore, jobs_counter_spec, jobs_flag_spec, jobs_timestamp_spec,
};

use crate::{
  BenchConfig, baseline,
  report::{self, ReportRow},
  stats::LatencyStats,
};

fn update_fields() -> FieldUpdate {
  FieldUpdate::new().set("status", "updated").set("rate", 150.0)
}

async fn time_creates(
  store: &SqliteStore,
  spec: &TableSpec,
  cfg: &BenchConfig,
) -> Result<Vec<Duration>> {
  let update = update_fields();
  let mut samples = Vec::with_capacity(cfg.iterations);
  for i in 0..cfg.iterations {
    let id = format!("job{}", i % cfg.entities);
    let start = Instant::now();
    store.create_version(spec, &id, &update).await?;
    samples.push(start.elapsed());
  }
  Ok(samples)
}

async fn time_bulk_current(
  store: &SqliteStore,
  spec: &TableSpec,
  cfg: &BenchConfig,
) -> Result<Vec<Duration>> {
  let predicate = Predicate::new();
  let mut samples = Vec::with_capacity(cfg.iterations);
  for _ in 0..cfg.iterations {
    let start = Instant::now();
    store.current_matching(spec, &predicate).await?;
    samples.push(start.elapsed());
  }
  Ok(samples)
}

pub async fn run(store: &SqliteStore, cfg: &BenchConfig) -> Result<()> {
  tracing::info!(
    entities = cfg.entities,
    iterations = cfg.iterations,
    "benchmarking"
  );

  let specs: [(&'static str, TableSpec); 3] = [
    ("counter", jobs_counter_spec()),
    ("timestamp", jobs_timestamp_spec()),
    ("flag", jobs_flag_spec()),
  ];

  let mut create_rows = Vec::new();
  let mut query_rows = Vec::new();
  for (name, spec) in &specs {
    let creates = time_creates(store, spec, cfg).await?;
    let queries = time_bulk_current(store, spec, cfg).await?;
    if let Some(stats) = LatencyStats::from_samples(&creates) {
      create_rows.push(ReportRow { name: *name, stats });
    }
    if let Some(stats) = LatencyStats::from_samples(&queries) {
      query_rows.push(ReportRow { name: *name, stats });
    }
    tracing::info!(strategy = *name, "measured");
  }

  // Direct-SQL baseline over the counter table, on its own connection.
  let conn = tokio_rusqlite::Connection::open(&cfg.db_path).await?;

  let mut base_creates = Vec::with_capacity(cfg.iterations);
  for i in 0..cfg.iterations {
    let id = format!("job{}", i % cfg.entities);
    let start = Instant::now();
    baseline::create_version_direct(&conn, &id).await?;
    base_creates.push(start.elapsed());
  }

  let mut base_queries = Vec::with_capacity(cfg.iterations);
  for _ in 0..cfg.iterations {
    let start = Instant::now();
    baseline::latest_versions_direct(&conn).await?;
    base_queries.push(start.elapsed());
  }

  let base_create_stats = LatencyStats::from_samples(&base_creates);
  let base_query_stats = LatencyStats::from_samples(&base_queries);
  if let Some(stats) = base_create_stats {
    create_rows.push(ReportRow { name: "direct sql", stats });
  }
  if let Some(stats) = base_query_stats {
    query_rows.push(ReportRow { name: "direct sql", stats });
  }

  report::print_section("VERSION CREATION", &create_rows);
  report::print_section("BULK CURRENT QUERY", &query_rows);
  println!();

  // The counter strategy is the abstraction's equivalent of the baseline's
  // table, so that is the pair compared.
  if let (Some(abstraction), Some(base)) = (
    create_rows.iter().find(|r| r.name == "counter").map(|r| r.stats),
    base_create_stats,
  ) {
    report::print_comparison("version creation", &abstraction, &base);
  }
  if let (Some(abstraction), Some(base)) = (
    query_rows.iter().find(|r| r.name == "counter").map(|r| r.stats),
    base_query_stats,
  ) {
    report::print_comparison("bulk current queries", &abstraction, &base);
  }

  Ok(())
}
