//! The closed set of versioning strategies and their discriminators.
//!
//! A strategy decides how "which row is current" is physically represented.
//! The pure half of the capability surface (first and next discriminator)
//! lives here; backends translate current-row selection and writes into SQL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How current-row selection is physically represented for a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
  /// A monotonically increasing `version` counter; the maximum per id is
  /// current.
  Counter,
  /// A `created_at` timestamp; the maximum per id is current. An exact-tie
  /// insert is rejected by a unique constraint and retried with a fresh
  /// timestamp, so ties never exist in the table.
  Timestamp,
  /// A `version` counter plus an `is_current` flag; exactly one row per id
  /// carries the flag at any time.
  Flag,
}

/// The strategy-specific field(s) that order versions and select the
/// current one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Discriminator {
  Counter { version: i64 },
  Timestamp { created_at: DateTime<Utc> },
  Flag { version: i64, is_current: bool },
}

impl Discriminator {
  /// The integer version, for the strategies that carry one.
  pub fn version(&self) -> Option<i64> {
    match self {
      Self::Counter { version } | Self::Flag { version, .. } => Some(*version),
      Self::Timestamp { .. } => None,
    }
  }

  pub fn created_at(&self) -> Option<DateTime<Utc>> {
    match self {
      Self::Timestamp { created_at } => Some(*created_at),
      _ => None,
    }
  }

  pub fn is_current_flag(&self) -> Option<bool> {
    match self {
      Self::Flag { is_current, .. } => Some(*is_current),
      _ => None,
    }
  }
}

impl Strategy {
  /// The discriminator an entity is born with.
  pub fn first_discriminator(&self, now: DateTime<Utc>) -> Discriminator {
    match self {
      Self::Counter => Discriminator::Counter { version: 1 },
      Self::Timestamp => Discriminator::Timestamp { created_at: now },
      Self::Flag => Discriminator::Flag { version: 1, is_current: true },
    }
  }

  /// Derive the next discriminator from the current row's.
  ///
  /// Fails with [`Error::StrategyMismatch`] if `previous` was produced by a
  /// different strategy.
  pub fn next_discriminator(
    &self,
    previous: &Discriminator,
    now: DateTime<Utc>,
  ) -> Result<Discriminator> {
    match (self, previous) {
      (Self::Counter, Discriminator::Counter { version }) => {
        Ok(Discriminator::Counter { version: version + 1 })
      }
      (Self::Timestamp, Discriminator::Timestamp { .. }) => {
        Ok(Discriminator::Timestamp { created_at: now })
      }
      (Self::Flag, Discriminator::Flag { version, .. }) => Ok(Discriminator::Flag {
        version:    version + 1,
        is_current: true,
      }),
      _ => Err(Error::StrategyMismatch { expected: *self }),
    }
  }
}
