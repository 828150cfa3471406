//! Core types and trait definitions for the Strata versioning engine.
//!
//! This crate is deliberately free of database and I/O dependencies.
//! Storage backends and tooling depend on it; it depends on nothing heavier
//! than serde.

pub mod error;
pub mod record;
pub mod store;
pub mod strategy;
pub mod table;

pub use error::{Error, Result};
