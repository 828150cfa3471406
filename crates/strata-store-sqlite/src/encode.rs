//! Encoding helpers between domain values and SQLite column values.
//!
//! Timestamps are stored as RFC 3339 strings, UUIDs as hyphenated lowercase
//! strings, booleans as 0/1 integers. Payload values map to the closest
//! SQLite type; arrays and objects are stored as compact JSON text.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use strata_core::{record::VersionRecord, strategy::Discriminator};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String {
  id.hyphenated().to_string()
}

pub fn decode_uuid(s: &str) -> Result<Uuid> {
  Ok(Uuid::parse_str(s)?)
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339()
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(e.to_string()))
}

// ─── Payload values ──────────────────────────────────────────────────────────

/// Lower a JSON payload value into the SQLite value bound as a parameter.
pub fn json_to_sql(value: &serde_json::Value) -> Result<SqlValue> {
  use serde_json::Value;

  Ok(match value {
    Value::Null => SqlValue::Null,
    Value::Bool(b) => SqlValue::Integer(*b as i64),
    Value::Number(n) => {
      if let Some(i) = n.as_i64() {
        SqlValue::Integer(i)
      } else if let Some(f) = n.as_f64() {
        SqlValue::Real(f)
      } else {
        return Err(Error::Decode(format!("unrepresentable number: {n}")));
      }
    }
    Value::String(s) => SqlValue::Text(s.clone()),
    Value::Array(_) | Value::Object(_) => {
      SqlValue::Text(serde_json::to_string(value)?)
    }
  })
}

/// Lift a SQLite column value back into a JSON payload value.
pub fn sql_to_json(value: SqlValue) -> Result<serde_json::Value> {
  use serde_json::Value;

  Ok(match value {
    SqlValue::Null => Value::Null,
    SqlValue::Integer(i) => Value::from(i),
    SqlValue::Real(f) => serde_json::Number::from_f64(f)
      .map(Value::Number)
      .unwrap_or(Value::Null),
    SqlValue::Text(s) => Value::String(s),
    SqlValue::Blob(_) => {
      return Err(Error::Decode("blob columns are not part of the payload model".into()));
    }
  })
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// The discriminator columns of one row, as read from SQLite.
pub enum RawDiscriminator {
  Counter { version: i64 },
  Timestamp { created_at: String },
  Flag { version: i64, is_current: i64 },
}

/// Raw column values read from one version row, before decoding.
pub struct RawRecord {
  pub uid:    String,
  pub id:     String,
  pub disc:   RawDiscriminator,
  pub fields: Vec<(String, SqlValue)>,
}

impl RawRecord {
  pub fn into_record(self) -> Result<VersionRecord> {
    let discriminator = match self.disc {
      RawDiscriminator::Counter { version } => Discriminator::Counter { version },
      RawDiscriminator::Timestamp { created_at } => Discriminator::Timestamp {
        created_at: decode_dt(&created_at)?,
      },
      RawDiscriminator::Flag { version, is_current } => Discriminator::Flag {
        version,
        is_current: match is_current {
          0 => false,
          1 => true,
          other => {
            return Err(Error::Decode(format!("is_current out of range: {other}")));
          }
        },
      },
    };

    let mut fields = BTreeMap::new();
    for (column, value) in self.fields {
      fields.insert(column, sql_to_json(value)?);
    }

    Ok(VersionRecord {
      id: self.id,
      uid: decode_uuid(&self.uid)?,
      discriminator,
      fields,
    })
  }
}
