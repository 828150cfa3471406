//! The `VersionStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `strata-store-sqlite`).
//! Tooling and higher layers depend on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use crate::{
  record::{FieldUpdate, VersionRecord},
  table::TableSpec,
};

// ─── Predicate ───────────────────────────────────────────────────────────────

/// One conjunct of a [`Predicate`], applied to a declared business column of
/// the entity's *current* row.
#[derive(Debug, Clone)]
pub enum Filter {
  /// `column = value`
  Eq(String, serde_json::Value),
  /// `column >= value`
  Ge(String, serde_json::Value),
  /// `column <= value`
  Le(String, serde_json::Value),
}

impl Filter {
  pub fn column(&self) -> &str {
    match self {
      Self::Eq(c, _) | Self::Ge(c, _) | Self::Le(c, _) => c,
    }
  }
}

/// A conjunctive filter over current rows. An empty predicate matches the
/// current row of every entity.
#[derive(Debug, Clone, Default)]
pub struct Predicate {
  filters: Vec<Filter>,
}

impl Predicate {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn eq(
    mut self,
    column: impl Into<String>,
    value: impl Into<serde_json::Value>,
  ) -> Self {
    self.filters.push(Filter::Eq(column.into(), value.into()));
    self
  }

  pub fn ge(
    mut self,
    column: impl Into<String>,
    value: impl Into<serde_json::Value>,
  ) -> Self {
    self.filters.push(Filter::Ge(column.into(), value.into()));
    self
  }

  pub fn le(
    mut self,
    column: impl Into<String>,
    value: impl Into<serde_json::Value>,
  ) -> Self {
    self.filters.push(Filter::Le(column.into(), value.into()));
    self
  }

  pub fn filters(&self) -> &[Filter] {
    &self.filters
  }

  pub fn is_empty(&self) -> bool {
    self.filters.is_empty()
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Strata versioning backend.
///
/// All writes are append-only: a backend only ever reads and inserts version
/// rows (plus the atomic flag flip for the Flag strategy). No operation
/// updates a historical row's business fields or deletes a row.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait VersionStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Bootstrap an entity: insert its first version row (version 1, first
  /// timestamp, or `is_current = true`, per the table's strategy).
  ///
  /// Columns absent from `fields` are stored as NULL. Fails if any row for
  /// `id` already exists.
  fn create_entity<'a>(
    &'a self,
    table: &'a TableSpec,
    id: &'a str,
    fields: &'a FieldUpdate,
  ) -> impl Future<Output = Result<VersionRecord, Self::Error>> + Send + 'a;

  /// Derive and insert the next version of an existing entity.
  ///
  /// The new row copies every field of the current row, overwrites the
  /// columns named in `update`, and carries a fresh `uid` and the next
  /// discriminator. The read-derive-write sequence runs in one transaction
  /// and is retried a bounded number of times when a concurrent writer wins
  /// the race.
  fn create_version<'a>(
    &'a self,
    table: &'a TableSpec,
    id: &'a str,
    update: &'a FieldUpdate,
  ) -> impl Future<Output = Result<VersionRecord, Self::Error>> + Send + 'a;

  /// The entity's current row, or `None` if no row exists for `id`.
  fn current<'a>(
    &'a self,
    table: &'a TableSpec,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<VersionRecord>, Self::Error>> + Send + 'a;

  /// Bulk resolution: the current row of every entity whose *current* row
  /// satisfies `predicate`, as one set-oriented query. Entities whose
  /// current row fails the predicate are excluded entirely, even if an
  /// older version would have matched.
  fn current_matching<'a>(
    &'a self,
    table: &'a TableSpec,
    predicate: &'a Predicate,
  ) -> impl Future<Output = Result<Vec<VersionRecord>, Self::Error>> + Send + 'a;

  /// The entity's full version chain, oldest first.
  fn history<'a>(
    &'a self,
    table: &'a TableSpec,
    id: &'a str,
  ) -> impl Future<Output = Result<Vec<VersionRecord>, Self::Error>> + Send + 'a;
}
