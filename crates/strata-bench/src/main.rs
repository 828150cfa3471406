//! strata-bench binary.
//!
//! Seeds the demo jobs schema, runs the demo read paths, and benchmarks the
//! three versioning strategies against a hand-written direct-SQL baseline.
//!
//! Reads `strata.toml` (or the path given with `--config`); every setting
//! can also come from the `STRATA_` environment.

mod baseline;
mod demo;
mod report;
mod runner;
mod seed;
mod stats;

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Deserialize;
use strata_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Strata SCD benchmark harness")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "strata.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Reset the database and seed fresh demo entities.
  Seed,
  /// Run the demo queries against seeded data.
  Demo,
  /// Reset, seed, and benchmark all three strategies against the
  /// direct-SQL baseline.
  Bench {
    /// Override the configured iteration count.
    #[arg(long)]
    iterations: Option<usize>,
  },
}

/// Runtime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BenchConfig {
  #[serde(default = "default_db_path")]
  pub db_path:    PathBuf,
  /// Seeded entities per strategy table.
  #[serde(default = "default_entities")]
  pub entities:   usize,
  /// Timed calls per operation per strategy.
  #[serde(default = "default_iterations")]
  pub iterations: usize,
}

fn default_db_path() -> PathBuf {
  PathBuf::from("strata-bench.db")
}

fn default_entities() -> usize {
  1000
}

fn default_iterations() -> usize {
  100
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(config::Environment::with_prefix("STRATA"))
    .build()
    .context("failed to read config")?;
  let mut cfg: BenchConfig = settings
    .try_deserialize()
    .context("failed to deserialise BenchConfig")?;

  if matches!(cli.command, Command::Seed | Command::Bench { .. }) {
    reset_database(&cfg.db_path)?;
  }

  let store = SqliteStore::open(&cfg.db_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.db_path))?;

  match cli.command {
    Command::Seed => seed::run(&store, cfg.entities).await?,
    Command::Demo => demo::run(&store, &cfg).await?,
    Command::Bench { iterations } => {
      if let Some(n) = iterations {
        cfg.iterations = n;
      }
      seed::run(&store, cfg.entities).await?;
      runner::run(&store, &cfg).await?;
    }
  }

  Ok(())
}

/// Start from an empty database file. The engine never deletes rows, so a
/// reseed replaces the file instead.
fn reset_database(path: &Path) -> anyhow::Result<()> {
  for suffix in ["", "-wal", "-shm"] {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    match std::fs::remove_file(PathBuf::from(name)) {
      Ok(()) => {}
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
      Err(e) => return Err(e.into()),
    }
  }
  Ok(())
}
