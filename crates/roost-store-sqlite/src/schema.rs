//! Versioned schema for the Roost SQLite store.
//!
//! Migrations are an ordered, append-only list gated on
//! `PRAGMA user_version`. A released routine is never edited — stores
//! already stamped with its version must stay compatible — so later fixes
//! land as new, higher versions. Every routine must tolerate replay against
//! a store that already contains its changes.

use rusqlite::Connection;

/// One schema version: its index set and upgrade routine.
pub struct Migration {
  pub version: i64,
  pub name:    &'static str,
  pub run:     fn(&Connection) -> rusqlite::Result<()>,
}

/// Failure applying a single migration.
#[derive(Debug)]
pub struct MigrationFailure {
  pub version: i64,
  pub source:  rusqlite::Error,
}

/// Full schema history, oldest first.
pub const MIGRATIONS: &[Migration] = &[
  Migration {
    version: 1,
    name:    "base tables",
    run:     migrate_v1,
  },
  Migration {
    version: 2,
    name:    "capture sort keys",
    run:     migrate_v2,
  },
  Migration {
    version: 3,
    name:    "capture source/epoch index",
    run:     migrate_v3,
  },
];

/// Bring `conn` up to the newest declared version.
///
/// Versions at or below the persisted baseline are skipped entirely; each
/// executed version runs inside its own transaction and stamps
/// `user_version` before the next one starts. Returns the resulting schema
/// version.
pub fn migrate(conn: &mut Connection) -> Result<i64, MigrationFailure> {
  let baseline: i64 = conn
    .query_row("PRAGMA user_version", [], |row| row.get(0))
    .map_err(|e| MigrationFailure { version: 0, source: e })?;

  let mut version = baseline;
  for m in MIGRATIONS.iter().filter(|m| m.version > baseline) {
    apply(conn, m)
      .map_err(|e| MigrationFailure { version: m.version, source: e })?;
    tracing::debug!(
      version = m.version,
      name = m.name,
      "applied schema migration"
    );
    version = m.version;
  }
  Ok(version)
}

fn apply(conn: &mut Connection, m: &Migration) -> rusqlite::Result<()> {
  let tx = conn.transaction()?;
  (m.run)(&tx)?;
  tx.pragma_update(None, "user_version", m.version)?;
  tx.commit()
}

// ─── Version 1: base tables ──────────────────────────────────────────────────

fn migrate_v1(conn: &Connection) -> rusqlite::Result<()> {
  conn.execute_batch(
    "CREATE TABLE IF NOT EXISTS posts (
        rest_id          TEXT PRIMARY KEY,
        body             TEXT NOT NULL,     -- full record JSON
        created_epoch_ms INTEGER NOT NULL,  -- annotation columns, indexed
        updated_epoch_ms INTEGER NOT NULL,
        media_count      INTEGER NOT NULL
     );

     CREATE TABLE IF NOT EXISTS profiles (
        rest_id          TEXT PRIMARY KEY,
        body             TEXT NOT NULL,
        created_epoch_ms INTEGER NOT NULL,
        updated_epoch_ms INTEGER NOT NULL,
        media_count      INTEGER NOT NULL
     );

     CREATE TABLE IF NOT EXISTS captures (
        capture_id       TEXT PRIMARY KEY,  -- source + record id
        source           TEXT NOT NULL,
        kind             TEXT NOT NULL,     -- 'post' | 'profile'
        record_id        TEXT NOT NULL,
        created_epoch_ms INTEGER NOT NULL
     );

     CREATE INDEX IF NOT EXISTS captures_source_idx  ON captures(source);
     CREATE INDEX IF NOT EXISTS captures_created_idx ON captures(created_epoch_ms);
     CREATE INDEX IF NOT EXISTS posts_created_idx    ON posts(created_epoch_ms);",
  )
}

// ─── Version 2: capture sort keys ────────────────────────────────────────────

fn migrate_v2(conn: &Connection) -> rusqlite::Result<()> {
  // Replay-safe: a store that already carries the column must no-op.
  let has_column = conn
    .prepare(
      "SELECT 1 FROM pragma_table_info('captures') WHERE name = 'sort_key'",
    )?
    .exists([])?;
  if !has_column {
    conn.execute("ALTER TABLE captures ADD COLUMN sort_key TEXT", [])?;
  }
  conn.execute(
    "CREATE INDEX IF NOT EXISTS captures_sort_idx ON captures(sort_key)",
    [],
  )?;
  Ok(())
}

// ─── Version 3: composite source/epoch index ─────────────────────────────────

fn migrate_v3(conn: &Connection) -> rusqlite::Result<()> {
  conn.execute(
    "CREATE INDEX IF NOT EXISTS captures_source_created_idx
       ON captures(source, created_epoch_ms)",
    [],
  )?;
  Ok(())
}
