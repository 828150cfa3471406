//! Hand-written direct-SQL baseline over the Counter table — what a caller
//! would write without the versioning engine.

use anyhow::Result;
use tokio_rusqlite::Connection;
use uuid::Uuid;

/// Version creation without the engine: one `INSERT … SELECT` that copies
/// the latest row, bumps the version, and applies the overwrites inline.
pub async fn create_version_direct(conn: &Connection, id: &str) -> Result<()> {
  let id = id.to_owned();
  let uid = Uuid::new_v4().hyphenated().to_string();
  conn
    .call(move |conn| {
      conn.execute(
        "INSERT INTO jobs
           (uid, id, version, status, rate, title, company_id, contractor_id)
         SELECT ?1, id, version + 1, 'updated', 150.0,
                title, company_id, contractor_id
         FROM jobs
         WHERE id = ?2
         ORDER BY version DESC
         LIMIT 1",
        rusqlite::params![uid, id],
      )?;
      Ok(())
    })
    .await?;
  Ok(())
}

/// Bulk current query without the engine.
pub async fn latest_versions_direct(conn: &Connection) -> Result<usize> {
  let count = conn
    .call(|conn| {
      let mut stmt = conn.prepare(
        "SELECT j1.uid FROM jobs j1
         JOIN (SELECT id, MAX(version) AS latest_version
               FROM jobs GROUP BY id) j2
           ON j1.id = j2.id AND j1.version = j2.latest_version",
      )?;
      let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows.len())
    })
    .await?;
  Ok(count)
}
