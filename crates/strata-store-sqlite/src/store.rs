//! [`SqliteStore`] — the SQLite implementation of [`VersionStore`].
//!
//! Writes are optimistic: each `create_version` attempt runs its whole
//! read-derive-write sequence in one deferred transaction and relies on the
//! schema's unique constraints (and the conditional flag clear) to detect a
//! concurrent writer, retrying a bounded number of times.

use std::{collections::BTreeMap, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, params_from_iter, types::Value as SqlValue};
use uuid::Uuid;

use strata_core::{
  record::{FieldUpdate, VersionRecord},
  store::{Filter, Predicate, VersionStore},
  strategy::Strategy,
  table::TableSpec,
};

use crate::{
  Error, Result, adapter,
  encode::{RawRecord, encode_uuid, json_to_sql},
  schema::SCHEMA,
};

// ─── Config ──────────────────────────────────────────────────────────────────

/// Tunables for a [`SqliteStore`].
#[derive(Debug, Clone)]
pub struct StoreConfig {
  /// How many times `create_version` re-runs its read-derive-write sequence
  /// after a conflict before surfacing [`Error::Conflict`].
  pub max_conflict_retries: u32,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self { max_conflict_retries: 3 }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Strata version store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. Concurrent
/// writers are separate `SqliteStore`s opened on the same path; the engine
/// holds no shared mutable state of its own.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  config: StoreConfig,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with_config(path, StoreConfig::default()).await
  }

  pub async fn open_with_config(
    path: impl AsRef<Path>,
    config: StoreConfig,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn, config };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn, config: StoreConfig::default() };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── VersionStore impl ───────────────────────────────────────────────────────

impl VersionStore for SqliteStore {
  type Error = Error;

  async fn create_entity(
    &self,
    table: &TableSpec,
    id: &str,
    fields: &FieldUpdate,
  ) -> Result<VersionRecord> {
    for column in fields.fields().keys() {
      table.require_column(column)?;
    }

    // Columns not named in `fields` are stored as NULL; normalising here
    // keeps the returned record identical to what a later read produces.
    let payload: BTreeMap<String, serde_json::Value> = table
      .columns()
      .iter()
      .map(|c| {
        let value = fields.fields().get(c).cloned().unwrap_or(serde_json::Value::Null);
        (c.clone(), value)
      })
      .collect();

    let record = VersionRecord {
      id:            id.to_owned(),
      uid:           Uuid::new_v4(),
      discriminator: table.strategy().first_discriminator(Utc::now()),
      fields:        payload,
    };

    let table_cl = table.clone();
    let record_cl = record.clone();
    let inserted: Option<VersionRecord> = self
      .conn
      .call(move |conn| Ok(insert_first_version(conn, &table_cl, record_cl)))
      .await??;

    inserted.ok_or_else(|| Error::AlreadyExists {
      table: table.name().to_owned(),
      id:    id.to_owned(),
    })
  }

  async fn create_version(
    &self,
    table: &TableSpec,
    id: &str,
    update: &FieldUpdate,
  ) -> Result<VersionRecord> {
    for column in update.fields().keys() {
      table.require_column(column)?;
    }

    let mut attempts = 0;
    loop {
      let table_cl = table.clone();
      let id_cl = id.to_owned();
      let updates = update.fields().clone();
      let uid = Uuid::new_v4();
      let now = Utc::now();

      let outcome = self
        .conn
        .call(move |conn| Ok(write_next_version(conn, &table_cl, &id_cl, &updates, uid, now)))
        .await??;

      match outcome {
        Attempt::Written(record) => return Ok(record),
        Attempt::NotFound => {
          return Err(Error::NotFound {
            table: table.name().to_owned(),
            id:    id.to_owned(),
          });
        }
        Attempt::Invariant(message) => return Err(Error::InvariantViolation(message)),
        Attempt::Conflict => {
          if attempts >= self.config.max_conflict_retries {
            return Err(Error::Conflict {
              table: table.name().to_owned(),
              id:    id.to_owned(),
            });
          }
          attempts += 1;
          tracing::warn!(
            table = table.name(),
            id,
            attempt = attempts,
            "conflicting concurrent write, retrying"
          );
        }
      }
    }
  }

  async fn current(
    &self,
    table: &TableSpec,
    id: &str,
  ) -> Result<Option<VersionRecord>> {
    let table_cl = table.clone();
    let id_cl = id.to_owned();

    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        let sql = adapter::select_current_sql(&table_cl);
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_cl], |row| {
              adapter::read_raw(row, table_cl.strategy(), table_cl.columns())
            })
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRecord::into_record).transpose()
  }

  async fn current_matching(
    &self,
    table: &TableSpec,
    predicate: &Predicate,
  ) -> Result<Vec<VersionRecord>> {
    let (conjuncts, params) = predicate_clauses(table, predicate)?;
    let sql = adapter::select_current_matching_sql(table, &conjuncts);
    let table_cl = table.clone();

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params_from_iter(params), |row| {
            adapter::read_raw(row, table_cl.strategy(), table_cl.columns())
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn history(&self, table: &TableSpec, id: &str) -> Result<Vec<VersionRecord>> {
    let table_cl = table.clone();
    let id_cl = id.to_owned();

    let raws: Vec<RawRecord> = self
      .conn
      .call(move |conn| {
        let sql = adapter::select_history_sql(&table_cl);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_cl], |row| {
            adapter::read_raw(row, table_cl.strategy(), table_cl.columns())
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }
}

// ─── Write attempts ──────────────────────────────────────────────────────────

/// Outcome of one transactional write attempt.
enum Attempt {
  Written(VersionRecord),
  NotFound,
  Conflict,
  Invariant(String),
}

/// One transactional read-derive-write attempt for `create_version`.
///
/// Constraint violations and lock-upgrade failures on the write side are
/// classified as [`Attempt::Conflict`]; the transaction rolls back on drop
/// for every non-`Written` outcome.
fn write_next_version(
  conn: &mut rusqlite::Connection,
  table: &TableSpec,
  id: &str,
  updates: &BTreeMap<String, serde_json::Value>,
  uid: Uuid,
  now: DateTime<Utc>,
) -> Result<Attempt> {
  let tx = conn.transaction()?;

  let previous = read_current(&tx, table, id)?;
  let Some(previous) = previous else {
    // A Flag entity can exist while its current row is missing; that is a
    // broken invariant, not a missing entity.
    if table.strategy() == Strategy::Flag && any_row_exists(&tx, table, id)? {
      return Ok(Attempt::Invariant(format!(
        "no current row for existing entity {id:?} in {}",
        table.name()
      )));
    }
    return Ok(Attempt::NotFound);
  };
  let previous = previous.into_record()?;

  let discriminator = table
    .strategy()
    .next_discriminator(&previous.discriminator, now)?;

  if table.strategy() == Strategy::Flag {
    let clear = adapter::clear_current_sql(table);
    let cleared = match tx.execute(&clear, rusqlite::params![encode_uuid(previous.uid)]) {
      Ok(n) => n,
      Err(e) if is_conflict(&e) => return Ok(Attempt::Conflict),
      Err(e) => return Err(e.into()),
    };
    match cleared {
      1 => {}
      0 => return Ok(Attempt::Conflict),
      n => {
        return Ok(Attempt::Invariant(format!(
          "cleared {n} current rows for {id:?} in {}",
          table.name()
        )));
      }
    }
  }

  let mut fields = previous.fields;
  for (column, value) in updates {
    fields.insert(column.clone(), value.clone());
  }

  let record = VersionRecord { id: id.to_owned(), uid, discriminator, fields };

  match tx.execute(
    &adapter::insert_sql(table),
    params_from_iter(insert_params(table, &record)?),
  ) {
    Ok(_) => {}
    Err(e) if is_conflict(&e) => return Ok(Attempt::Conflict),
    Err(e) => return Err(e.into()),
  }

  match tx.commit() {
    Ok(()) => Ok(Attempt::Written(record)),
    Err(e) if is_conflict(&e) => Ok(Attempt::Conflict),
    Err(e) => Err(e.into()),
  }
}

/// Insert an entity's first version row. Returns `None` if any row for the
/// id already exists.
fn insert_first_version(
  conn: &mut rusqlite::Connection,
  table: &TableSpec,
  record: VersionRecord,
) -> Result<Option<VersionRecord>> {
  let tx = conn.transaction()?;

  // The Timestamp schema has no uniqueness on the first discriminator, so
  // existence is checked explicitly for every strategy.
  if any_row_exists(&tx, table, &record.id)? {
    return Ok(None);
  }

  match tx.execute(
    &adapter::insert_sql(table),
    params_from_iter(insert_params(table, &record)?),
  ) {
    Ok(_) => {}
    Err(e) if is_unique_violation(&e) => return Ok(None),
    Err(e) => return Err(e.into()),
  }

  tx.commit()?;
  Ok(Some(record))
}

fn read_current(
  conn: &rusqlite::Connection,
  table: &TableSpec,
  id: &str,
) -> Result<Option<RawRecord>> {
  let sql = adapter::select_current_sql(table);
  Ok(
    conn
      .query_row(&sql, rusqlite::params![id], |row| {
        adapter::read_raw(row, table.strategy(), table.columns())
      })
      .optional()?,
  )
}

fn any_row_exists(
  conn: &rusqlite::Connection,
  table: &TableSpec,
  id: &str,
) -> Result<bool> {
  let sql = format!("SELECT 1 FROM {} WHERE id = ?1 LIMIT 1", table.name());
  Ok(
    conn
      .query_row(&sql, rusqlite::params![id], |_| Ok(true))
      .optional()?
      .unwrap_or(false),
  )
}

/// Parameter values for one full row, in [`adapter::insert_sql`] order.
fn insert_params(table: &TableSpec, record: &VersionRecord) -> Result<Vec<SqlValue>> {
  let mut params = vec![
    SqlValue::Text(encode_uuid(record.uid)),
    SqlValue::Text(record.id.clone()),
  ];
  params.extend(adapter::discriminator_params(&record.discriminator));
  for column in table.columns() {
    params.push(match record.fields.get(column) {
      Some(value) => json_to_sql(value)?,
      None => SqlValue::Null,
    });
  }
  Ok(params)
}

/// Translate a [`Predicate`] into SQL conjuncts over the aliased row `t`
/// plus their bound parameter values.
fn predicate_clauses(
  table: &TableSpec,
  predicate: &Predicate,
) -> Result<(Vec<String>, Vec<SqlValue>)> {
  let mut conjuncts = Vec::new();
  let mut params = Vec::new();

  for filter in predicate.filters() {
    table.require_column(filter.column())?;
    let (column, op, value) = match filter {
      Filter::Eq(c, v) => (c, "=", v),
      Filter::Ge(c, v) => (c, ">=", v),
      Filter::Le(c, v) => (c, "<=", v),
    };
    params.push(json_to_sql(value)?);
    conjuncts.push(format!("t.{column} {op} ?{}", params.len()));
  }

  Ok((conjuncts, params))
}

// ─── Conflict classification ─────────────────────────────────────────────────

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(e, rusqlite::Error::SqliteFailure(err, _)
    if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
      || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY)
}

fn is_busy(e: &rusqlite::Error) -> bool {
  matches!(
    e.sqlite_error_code(),
    Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
  )
}

/// A concurrent writer won the race: the new discriminator collided, or the
/// deferred transaction lost its lock upgrade.
fn is_conflict(e: &rusqlite::Error) -> bool {
  is_unique_violation(e) || is_busy(e)
}
