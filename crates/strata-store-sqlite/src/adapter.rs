//! Strategy adapters: the concrete SQL behind each [`Strategy`].
//!
//! Every adapter answers the same capability surface — select the current
//! row, derive the next discriminator (pure, in `strata-core`), and write
//! the derived row. Counter and Timestamp write with a single insert; Flag
//! additionally clears the previous row's flag in the same transaction.
//!
//! All identifiers interpolated here come from a validated [`TableSpec`];
//! caller-supplied values are always bound as parameters.

use rusqlite::types::Value as SqlValue;
use strata_core::{
  strategy::{Discriminator, Strategy},
  table::TableSpec,
};

use crate::encode::{RawDiscriminator, RawRecord, encode_dt};

/// The discriminator columns a strategy owns, in select order.
fn discriminator_columns(strategy: Strategy) -> &'static [&'static str] {
  match strategy {
    Strategy::Counter => &["version"],
    Strategy::Timestamp => &["created_at"],
    Strategy::Flag => &["version", "is_current"],
  }
}

/// The full select list for a table: identity, discriminator, payload.
fn select_list(table: &TableSpec, prefix: &str) -> String {
  let mut columns: Vec<String> = vec![format!("{prefix}uid"), format!("{prefix}id")];
  columns.extend(
    discriminator_columns(table.strategy())
      .iter()
      .map(|c| format!("{prefix}{c}")),
  );
  columns.extend(table.columns().iter().map(|c| format!("{prefix}{c}")));
  columns.join(", ")
}

/// `SELECT … WHERE id = ?1 …` returning the entity's current row.
pub fn select_current_sql(table: &TableSpec) -> String {
  let list = select_list(table, "");
  let name = table.name();
  match table.strategy() {
    Strategy::Counter => format!(
      "SELECT {list} FROM {name} WHERE id = ?1 ORDER BY version DESC LIMIT 1"
    ),
    Strategy::Timestamp => format!(
      "SELECT {list} FROM {name} WHERE id = ?1 ORDER BY created_at DESC LIMIT 1"
    ),
    Strategy::Flag => {
      format!("SELECT {list} FROM {name} WHERE id = ?1 AND is_current = 1")
    }
  }
}

/// `SELECT … WHERE id = ?1 ORDER BY …` returning the full version chain,
/// oldest first.
pub fn select_history_sql(table: &TableSpec) -> String {
  let list = select_list(table, "");
  let name = table.name();
  let order = match table.strategy() {
    Strategy::Counter | Strategy::Flag => "version ASC",
    Strategy::Timestamp => "created_at ASC",
  };
  format!("SELECT {list} FROM {name} WHERE id = ?1 ORDER BY {order}")
}

/// The single set-oriented query behind the bulk resolver. `conjuncts` holds
/// the caller's predicate clauses over the aliased row `t`, with parameters
/// already numbered from `?1`.
pub fn select_current_matching_sql(table: &TableSpec, conjuncts: &[String]) -> String {
  let list = select_list(table, "t.");
  let name = table.name();
  match table.strategy() {
    Strategy::Counter | Strategy::Timestamp => {
      let (disc, max) = match table.strategy() {
        Strategy::Counter => ("version", "MAX(version)"),
        _ => ("created_at", "MAX(created_at)"),
      };
      let filter = if conjuncts.is_empty() {
        String::new()
      } else {
        format!(" WHERE {}", conjuncts.join(" AND "))
      };
      format!(
        "SELECT {list} FROM {name} t \
         JOIN (SELECT id, {max} AS latest_{disc} FROM {name} GROUP BY id) latest \
           ON t.id = latest.id AND t.{disc} = latest.latest_{disc}\
         {filter} ORDER BY t.id"
      )
    }
    Strategy::Flag => {
      let filter = if conjuncts.is_empty() {
        String::new()
      } else {
        format!(" AND {}", conjuncts.join(" AND "))
      };
      format!(
        "SELECT {list} FROM {name} t WHERE t.is_current = 1{filter} ORDER BY t.id"
      )
    }
  }
}

/// `INSERT` of one fully-built version row, columns in select-list order.
pub fn insert_sql(table: &TableSpec) -> String {
  let mut columns: Vec<&str> = vec!["uid", "id"];
  columns.extend(discriminator_columns(table.strategy()));
  columns.extend(table.columns().iter().map(String::as_str));

  let placeholders = (1..=columns.len())
    .map(|i| format!("?{i}"))
    .collect::<Vec<_>>()
    .join(", ");

  format!(
    "INSERT INTO {} ({}) VALUES ({})",
    table.name(),
    columns.join(", "),
    placeholders
  )
}

/// Conditional clear of the previous current row. Affects exactly one row
/// iff the previous row is still current; zero rows means a concurrent
/// writer advanced the entity first.
pub fn clear_current_sql(table: &TableSpec) -> String {
  format!(
    "UPDATE {} SET is_current = 0 WHERE uid = ?1 AND is_current = 1",
    table.name()
  )
}

/// The parameter values for a discriminator, in column order.
pub fn discriminator_params(disc: &Discriminator) -> Vec<SqlValue> {
  match disc {
    Discriminator::Counter { version } => vec![SqlValue::Integer(*version)],
    Discriminator::Timestamp { created_at } => {
      vec![SqlValue::Text(encode_dt(*created_at))]
    }
    Discriminator::Flag { version, is_current } => vec![
      SqlValue::Integer(*version),
      SqlValue::Integer(*is_current as i64),
    ],
  }
}

/// Read one row laid out in select-list order into a [`RawRecord`].
pub fn read_raw(
  row: &rusqlite::Row<'_>,
  strategy: Strategy,
  columns: &[String],
) -> rusqlite::Result<RawRecord> {
  let uid: String = row.get(0)?;
  let id: String = row.get(1)?;

  let (disc, base) = match strategy {
    Strategy::Counter => (RawDiscriminator::Counter { version: row.get(2)? }, 3),
    Strategy::Timestamp => {
      (RawDiscriminator::Timestamp { created_at: row.get(2)? }, 3)
    }
    Strategy::Flag => (
      RawDiscriminator::Flag {
        version:    row.get(2)?,
        is_current: row.get(3)?,
      },
      4,
    ),
  };

  let mut fields = Vec::with_capacity(columns.len());
  for (i, column) in columns.iter().enumerate() {
    let value: SqlValue = row.get(base + i)?;
    fields.push((column.clone(), value));
  }

  Ok(RawRecord { uid, id, disc, fields })
}
