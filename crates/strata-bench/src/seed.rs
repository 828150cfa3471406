//! Seed data: N job entities per strategy table, plus one dependent
//! timelog and payment line item pinned to specific version uids.

use anyhow::{Context as _, Result};
use chrono::{Duration, Utc};
use strata_core::{record::FieldUpdate, store::VersionStore as _};
use strata_store_sqlite::{
  SqliteStore, jobs_counter_spec, jobs_flag_spec, jobs_timestamp_spec,
  payment_line_items_spec, timelogs_spec,
};

pub fn job_fields() -> FieldUpdate {
  FieldUpdate::new()
    .set("status", "active")
    .set("rate", 100.0)
    .set("title", "Engineer")
    .set("company_id", "comp1")
    .set("contractor_id", "cont1")
}

pub async fn run(store: &SqliteStore, entities: usize) -> Result<()> {
  for spec in [jobs_counter_spec(), jobs_timestamp_spec(), jobs_flag_spec()] {
    for i in 0..entities {
      store
        .create_entity(&spec, &format!("job{i}"), &job_fields())
        .await
        .with_context(|| format!("seeding {} job{i}", spec.name()))?;
    }
    tracing::info!(table = spec.name(), entities, "seeded");
  }

  // One dependent chain pinned to the first counter job's current version.
  let jobs = jobs_counter_spec();
  let job = store
    .current(&jobs, "job0")
    .await?
    .context("job0 missing after seed")?;

  let now = Utc::now();
  let timelog = store
    .create_entity(
      &timelogs_spec(),
      "tl1",
      &FieldUpdate::new()
        .set("duration", 8.0)
        .set("time_start", (now - Duration::hours(2)).to_rfc3339())
        .set("time_end", (now - Duration::hours(1)).to_rfc3339())
        .set("type", "work")
        .set("job_uid", job.uid.to_string()),
    )
    .await?;

  store
    .create_entity(
      &payment_line_items_spec(),
      "pli1",
      &FieldUpdate::new()
        .set("job_uid", job.uid.to_string())
        .set("timelog_uid", timelog.uid.to_string())
        .set("amount", 800.0)
        .set("status", "pending"),
    )
    .await?;

  tracing::info!("seeded dependent timelog and payment line item");
  Ok(())
}
