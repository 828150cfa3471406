//! Error types for `strata-core`.

use thiserror::Error;

use crate::strategy::Strategy;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid SQL identifier: {0:?}")]
  InvalidIdentifier(String),

  #[error("column {column:?} is not declared for table {table:?}")]
  UnknownColumn { table: String, column: String },

  #[error("discriminator does not belong to the {expected:?} strategy")]
  StrategyMismatch { expected: Strategy },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
