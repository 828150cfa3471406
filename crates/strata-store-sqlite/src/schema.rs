//! SQL schema for the demo jobs domain, plus its canonical [`TableSpec`]s.
//!
//! Executed once at connection startup. Idempotent thanks to
//! `CREATE TABLE IF NOT EXISTS`.

use strata_core::{strategy::Strategy, table::TableSpec};

/// Full schema DDL: one jobs table per strategy, two dependent tables, and
/// the indexes the engine's queries rely on.
pub const SCHEMA: &str = "
PRAGMA busy_timeout = 5000;
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Counter strategy: MAX(version) per id is current.
-- Rows are strictly append-only; no UPDATE or DELETE is ever issued.
CREATE TABLE IF NOT EXISTS jobs (
    uid           TEXT PRIMARY KEY,
    id            TEXT NOT NULL,
    version       INTEGER NOT NULL,
    status        TEXT,
    rate          REAL,
    title         TEXT,
    company_id    TEXT,
    contractor_id TEXT,
    UNIQUE (id, version)
);

-- Timestamp strategy: MAX(created_at) per id is current. The UNIQUE
-- constraint turns an exact timestamp tie into a retried conflict, so
-- 'latest created_at' is always unambiguous.
CREATE TABLE IF NOT EXISTS jobs_ts (
    uid           TEXT PRIMARY KEY,
    id            TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    status        TEXT,
    rate          REAL,
    title         TEXT,
    company_id    TEXT,
    contractor_id TEXT,
    UNIQUE (id, created_at)
);

-- Flag strategy: exactly one row per id carries is_current = 1. The only
-- UPDATE the engine ever issues is the atomic flag clear on the previous
-- current row.
CREATE TABLE IF NOT EXISTS jobs_flag (
    uid           TEXT PRIMARY KEY,
    id            TEXT NOT NULL,
    version       INTEGER NOT NULL,
    is_current    INTEGER NOT NULL DEFAULT 0,
    status        TEXT,
    rate          REAL,
    title         TEXT,
    company_id    TEXT,
    contractor_id TEXT,
    UNIQUE (id, version)
);

-- At most one current row per id, enforced by the store itself.
CREATE UNIQUE INDEX IF NOT EXISTS jobs_flag_current_idx
    ON jobs_flag (id) WHERE is_current = 1;

CREATE INDEX IF NOT EXISTS jobs_flag_is_current_idx
    ON jobs_flag (is_current);

-- Dependent tables reference a specific version's uid, never (id, version),
-- so historical references stay pinned as new versions appear.
CREATE TABLE IF NOT EXISTS timelogs (
    uid        TEXT PRIMARY KEY,
    id         TEXT NOT NULL,
    version    INTEGER NOT NULL,
    duration   REAL,
    time_start TEXT,
    time_end   TEXT,
    type       TEXT,
    job_uid    TEXT NOT NULL REFERENCES jobs(uid),
    UNIQUE (id, version)
);

CREATE TABLE IF NOT EXISTS payment_line_items (
    uid         TEXT PRIMARY KEY,
    id          TEXT NOT NULL,
    version     INTEGER NOT NULL,
    job_uid     TEXT NOT NULL REFERENCES jobs(uid),
    timelog_uid TEXT NOT NULL REFERENCES timelogs(uid),
    amount      REAL,
    status      TEXT,
    UNIQUE (id, version)
);

CREATE INDEX IF NOT EXISTS timelogs_job_uid_idx ON timelogs (job_uid);
CREATE INDEX IF NOT EXISTS pli_job_uid_idx      ON payment_line_items (job_uid);
";

const JOB_COLUMNS: [&str; 5] = ["status", "rate", "title", "company_id", "contractor_id"];

/// `jobs` — Counter strategy.
pub fn jobs_counter_spec() -> TableSpec {
  TableSpec::new("jobs", Strategy::Counter, JOB_COLUMNS).expect("static table spec")
}

/// `jobs_ts` — Timestamp strategy.
pub fn jobs_timestamp_spec() -> TableSpec {
  TableSpec::new("jobs_ts", Strategy::Timestamp, JOB_COLUMNS).expect("static table spec")
}

/// `jobs_flag` — Flag strategy.
pub fn jobs_flag_spec() -> TableSpec {
  TableSpec::new("jobs_flag", Strategy::Flag, JOB_COLUMNS).expect("static table spec")
}

/// `timelogs` — Counter strategy, `job_uid` pinned to a specific job version.
pub fn timelogs_spec() -> TableSpec {
  TableSpec::new(
    "timelogs",
    Strategy::Counter,
    ["duration", "time_start", "time_end", "type", "job_uid"],
  )
  .expect("static table spec")
}

/// `payment_line_items` — Counter strategy, pinned to job and timelog
/// versions.
pub fn payment_line_items_spec() -> TableSpec {
  TableSpec::new(
    "payment_line_items",
    Strategy::Counter,
    ["job_uid", "timelog_uid", "amount", "status"],
  )
  .expect("static table spec")
}
