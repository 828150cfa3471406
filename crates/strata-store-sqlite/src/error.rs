//! Error type for `strata-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] strata_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("row decode error: {0}")]
  Decode(String),

  /// `create_version` was called for an id with no rows.
  #[error("entity not found in {table:?}: {id:?}")]
  NotFound { table: String, id: String },

  /// `create_entity` was called for an id that already has rows.
  #[error("entity already exists in {table:?}: {id:?}")]
  AlreadyExists { table: String, id: String },

  /// A concurrent writer advanced the entity and the retry budget is
  /// exhausted. The caller may re-issue the operation.
  #[error("conflicting concurrent write in {table:?} for {id:?}")]
  Conflict { table: String, id: String },

  /// The store's physical state contradicts a versioning invariant; this is
  /// a bug in adapter atomicity, never retried or swallowed.
  #[error("invariant violation: {0}")]
  InvariantViolation(String),
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self {
    Self::Database(e.into())
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
