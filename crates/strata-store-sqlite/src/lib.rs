//! SQLite backend for the Strata versioning engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Concurrent writers are separate
//! connections to the same database file, coordinated purely by SQLite
//! transactions.

mod adapter;
mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use schema::{
  SCHEMA, jobs_counter_spec, jobs_flag_spec, jobs_timestamp_spec,
  payment_line_items_spec, timelogs_spec,
};
pub use store::{SqliteStore, StoreConfig};

#[cfg(test)]
mod tests;
