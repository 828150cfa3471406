//! Demo read paths over the seeded schema: current jobs by company and by
//! contractor through the bulk resolver, and the contractor-and-period
//! queries over dependent tables in direct SQL — joins across dependent
//! tables sit outside the engine surface.

use anyhow::Result;
use chrono::{Duration, Utc};
use strata_core::store::{Predicate, VersionStore as _};
use strata_store_sqlite::{SqliteStore, jobs_counter_spec};

use crate::BenchConfig;

pub async fn run(store: &SqliteStore, cfg: &BenchConfig) -> Result<()> {
  let jobs = jobs_counter_spec();

  println!("Active jobs for company comp1:");
  let by_company = store
    .current_matching(
      &jobs,
      &Predicate::new().eq("status", "active").eq("company_id", "comp1"),
    )
    .await?;
  for job in by_company.iter().take(5) {
    println!("  {}", serde_json::to_string(job)?);
  }
  println!("  ({} total)", by_company.len());

  println!("Active jobs for contractor cont1:");
  let by_contractor = store
    .current_matching(
      &jobs,
      &Predicate::new().eq("status", "active").eq("contractor_id", "cont1"),
    )
    .await?;
  println!("  ({} total)", by_contractor.len());

  let conn = tokio_rusqlite::Connection::open(&cfg.db_path).await?;
  let from = (Utc::now() - Duration::hours(24)).to_rfc3339();
  let to = (Utc::now() + Duration::hours(24)).to_rfc3339();

  println!("Timelogs for contractor cont1 in period:");
  let (from_cl, to_cl) = (from.clone(), to.clone());
  let timelogs = conn
    .call(move |conn| {
      let mut stmt = conn.prepare(
        "SELECT t.uid, t.id, t.version, t.duration, t.type
         FROM timelogs t
         JOIN jobs j ON t.job_uid = j.uid
         JOIN (SELECT id, MAX(version) AS latest_version
               FROM timelogs GROUP BY id) latest
           ON t.id = latest.id AND t.version = latest.latest_version
         WHERE j.contractor_id = ?1
           AND t.time_start >= ?2 AND t.time_end <= ?3",
      )?;
      let rows = stmt
        .query_map(rusqlite::params!["cont1", from_cl, to_cl], |row| {
          Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, f64>(3)?,
            row.get::<_, String>(4)?,
          ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await?;
  for (uid, id, version, duration, kind) in timelogs {
    println!("  {id} v{version} {kind} {duration}h ({uid})");
  }

  println!("Payment line items for contractor cont1 in period:");
  let items = conn
    .call(move |conn| {
      let mut stmt = conn.prepare(
        "SELECT p.uid, p.id, p.version, p.amount, p.status
         FROM payment_line_items p
         JOIN timelogs t ON p.timelog_uid = t.uid
         JOIN jobs j ON p.job_uid = j.uid
         JOIN (SELECT id, MAX(version) AS latest_version
               FROM payment_line_items GROUP BY id) latest
           ON p.id = latest.id AND p.version = latest.latest_version
         WHERE j.contractor_id = ?1
           AND t.time_start >= ?2 AND t.time_end <= ?3",
      )?;
      let rows = stmt
        .query_map(rusqlite::params!["cont1", from, to], |row| {
          Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, f64>(3)?,
            row.get::<_, String>(4)?,
          ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
    .await?;
  for (uid, id, version, amount, status) in items {
    println!("  {id} v{version} {status} {amount} ({uid})");
  }

  Ok(())
}
