//! Version records and partial updates.
//!
//! A version record is an immutable snapshot of an entity at a point in its
//! history. Records are never updated in place; mutation is expressed by
//! inserting a new record derived from the current one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::strategy::Discriminator;

/// One immutable version of an entity. Once written, no field ever changes;
/// only the arrival of a newer record changes which version is current.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRecord {
  /// Stable entity identity, shared by every version of the entity.
  pub id:            String,
  /// Globally unique surrogate key for this row; the target of foreign keys
  /// from dependent tables, so historical references never repoint.
  pub uid:           Uuid,
  pub discriminator: Discriminator,
  /// Business payload, keyed by declared column name.
  pub fields:        BTreeMap<String, serde_json::Value>,
}

impl VersionRecord {
  pub fn field(&self, column: &str) -> Option<&serde_json::Value> {
    self.fields.get(column)
  }
}

/// A partial update: only the named columns are overwritten in the derived
/// version; everything else is copied from the current row.
#[derive(Debug, Clone, Default)]
pub struct FieldUpdate {
  fields: BTreeMap<String, serde_json::Value>,
}

impl FieldUpdate {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set(
    mut self,
    column: impl Into<String>,
    value: impl Into<serde_json::Value>,
  ) -> Self {
    self.fields.insert(column.into(), value.into());
    self
  }

  pub fn fields(&self) -> &BTreeMap<String, serde_json::Value> {
    &self.fields
  }

  pub fn is_empty(&self) -> bool {
    self.fields.is_empty()
  }
}
