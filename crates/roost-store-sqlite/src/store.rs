//! [`SqliteStore`] — the SQLite implementation of [`CaptureStore`].

use std::{collections::HashMap, path::Path};

use roost_core::{
  capture::{self, Capture},
  record::{Annotations, Record, RecordKind},
  store::{CaptureStore, StoreBackup, StoreCounts},
  timefmt,
};

use crate::{
  Error, Result,
  encode::{self, RawCapture},
  schema,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Roost capture store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema migrations.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    let applied = self
      .conn
      .call(|conn| {
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Ok(schema::migrate(conn))
      })
      .await?;

    let version = applied.map_err(|e| Error::Migration {
      version: e.version,
      source:  e.source,
    })?;

    tracing::debug!(version, "capture store schema ready");
    Ok(())
  }

  async fn captures_where(
    &self,
    source: String,
    since_epoch_ms: Option<i64>,
  ) -> Result<Vec<Capture>> {
    let raws: Vec<RawCapture> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT source, kind, record_id, created_epoch_ms, sort_key
           FROM captures
           WHERE source = ?1 AND created_epoch_ms > ?2",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![source, since_epoch_ms.unwrap_or(i64::MIN)],
            |row| {
              Ok(RawCapture {
                source:           row.get(0)?,
                kind:             row.get(1)?,
                record_id:        row.get(2)?,
                created_epoch_ms: row.get(3)?,
                sort_key:         row.get(4)?,
              })
            },
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawCapture::into_capture).collect()
  }
}

// ─── CaptureStore impl ───────────────────────────────────────────────────────

impl CaptureStore for SqliteStore {
  type Error = Error;

  // ── Writes ────────────────────────────────────────────────────────────────

  async fn upsert_records(&self, mut records: Vec<Record>) -> Result<()> {
    if records.is_empty() {
      return Ok(());
    }

    // The annotation block is store-owned: recomputed whole on every upsert.
    let now = timefmt::now_ms();
    let rows: Vec<(RecordKind, String, String, Annotations)> = records
      .iter_mut()
      .map(|record| {
        record.annotate(now);
        Ok((
          record.kind(),
          record.rest_id().to_string(),
          serde_json::to_string(record)?,
          *record.note(),
        ))
      })
      .collect::<Result<_>>()?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut post_stmt = tx.prepare(UPSERT_POST)?;
          let mut profile_stmt = tx.prepare(UPSERT_PROFILE)?;
          for (kind, rest_id, body, note) in rows {
            let stmt = match kind {
              RecordKind::Post => &mut post_stmt,
              RecordKind::Profile => &mut profile_stmt,
            };
            stmt.execute(rusqlite::params![
              rest_id,
              body,
              note.created_epoch_ms,
              note.updated_epoch_ms,
              note.media_count,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn upsert_captures(&self, captures: Vec<Capture>) -> Result<()> {
    if captures.is_empty() {
      return Ok(());
    }

    let rows: Vec<(String, String, &'static str, String, i64, Option<String>)> =
      captures
        .iter()
        .map(|c| {
          (
            c.composite_id(),
            c.source.clone(),
            encode::encode_kind(c.kind),
            c.record_id.clone(),
            c.created_epoch_ms,
            c.sort_key.as_ref().map(|k| k.as_str().to_string()),
          )
        })
        .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(UPSERT_CAPTURE)?;
          for (id, source, kind, record_id, epoch, sort_key) in rows {
            stmt.execute(rusqlite::params![
              id, source, kind, record_id, epoch, sort_key,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn captures_for_source(&self, source: &str) -> Result<Vec<Capture>> {
    self.captures_where(source.to_string(), None).await
  }

  async fn captures_for_source_since(
    &self,
    source: &str,
    since_epoch_ms: i64,
  ) -> Result<Vec<Capture>> {
    self
      .captures_where(source.to_string(), Some(since_epoch_ms))
      .await
  }

  async fn records_for_captures(
    &self,
    captures: &[Capture],
    kind: RecordKind,
  ) -> Result<Vec<Record>> {
    let mut wanted: Vec<Capture> =
      captures.iter().filter(|c| c.kind == kind).cloned().collect();
    if wanted.is_empty() {
      return Ok(Vec::new());
    }
    wanted.sort_by(capture::source_order);

    // Bulk lookups do not preserve order; restore it from the sorted
    // capture list via the body map.
    let ids: Vec<String> =
      wanted.iter().map(|c| c.record_id.clone()).collect();
    let table = encode::table_for(kind);

    let bodies: HashMap<String, String> = self
      .conn
      .call(move |conn| {
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
          "SELECT rest_id, body FROM {table} WHERE rest_id IN ({placeholders})"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(ids.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows.into_iter().collect())
      })
      .await?;

    let mut records = Vec::with_capacity(wanted.len());
    for cap in &wanted {
      match bodies.get(&cap.record_id) {
        Some(body) => match encode::decode_record_body(body) {
          Some(record) => records.push(record),
          None => tracing::warn!(
            record_id = %cap.record_id,
            "dropping capture whose record body is empty or invalid"
          ),
        },
        None => tracing::warn!(
          record_id = %cap.record_id,
          "dropping capture whose record is missing"
        ),
      }
    }
    Ok(records)
  }

  async fn count(&self) -> Result<StoreCounts> {
    let (posts, profiles, captures): (i64, i64, i64) = self
      .conn
      .call(|conn| {
        let posts =
          conn.query_row("SELECT COUNT(*) FROM posts", [], |r| r.get(0))?;
        let profiles =
          conn.query_row("SELECT COUNT(*) FROM profiles", [], |r| r.get(0))?;
        let captures =
          conn.query_row("SELECT COUNT(*) FROM captures", [], |r| r.get(0))?;
        Ok((posts, profiles, captures))
      })
      .await?;

    Ok(StoreCounts {
      posts:    posts as u64,
      profiles: profiles as u64,
      captures: captures as u64,
    })
  }

  // ── Bulk lifecycle ────────────────────────────────────────────────────────

  async fn clear_source(&self, source: &str) -> Result<()> {
    let source = source.to_string();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM captures WHERE source = ?1",
          rusqlite::params![source],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn clear_all(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(
          "DELETE FROM posts; DELETE FROM profiles; DELETE FROM captures;",
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn export_all(&self) -> Result<StoreBackup> {
    let (post_bodies, profile_bodies, raw_captures) = self
      .conn
      .call(|conn| {
        let post_bodies = read_bodies(conn, "posts")?;
        let profile_bodies = read_bodies(conn, "profiles")?;

        let mut stmt = conn.prepare(
          "SELECT source, kind, record_id, created_epoch_ms, sort_key
           FROM captures",
        )?;
        let raw_captures = stmt
          .query_map([], |row| {
            Ok(RawCapture {
              source:           row.get(0)?,
              kind:             row.get(1)?,
              record_id:        row.get(2)?,
              created_epoch_ms: row.get(3)?,
              sort_key:         row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok((post_bodies, profile_bodies, raw_captures))
      })
      .await?;

    // Best-effort: skip rows that no longer decode instead of failing the
    // whole backup.
    let mut backup = StoreBackup::default();
    for body in &post_bodies {
      match encode::decode_record_body(body) {
        Some(Record::Post(p)) => backup.posts.push(p),
        _ => tracing::warn!("skipping undecodable post row in backup"),
      }
    }
    for body in &profile_bodies {
      match encode::decode_record_body(body) {
        Some(Record::Profile(p)) => backup.profiles.push(p),
        _ => tracing::warn!("skipping undecodable profile row in backup"),
      }
    }
    for raw in raw_captures {
      match raw.into_capture() {
        Ok(capture) => backup.captures.push(capture),
        Err(e) => {
          tracing::warn!(error = %e, "skipping undecodable capture row in backup");
        }
      }
    }
    Ok(backup)
  }

  async fn import_all(&self, backup: StoreBackup) -> Result<()> {
    // Restores preserve annotation blocks exactly as exported.
    let mut record_rows: Vec<(RecordKind, String, String, Annotations)> =
      Vec::with_capacity(backup.posts.len() + backup.profiles.len());
    for post in backup.posts {
      let record = Record::Post(post);
      record_rows.push((
        RecordKind::Post,
        record.rest_id().to_string(),
        serde_json::to_string(&record)?,
        *record.note(),
      ));
    }
    for profile in backup.profiles {
      let record = Record::Profile(profile);
      record_rows.push((
        RecordKind::Profile,
        record.rest_id().to_string(),
        serde_json::to_string(&record)?,
        *record.note(),
      ));
    }

    let capture_rows: Vec<(String, String, &'static str, String, i64, Option<String>)> =
      backup
        .captures
        .iter()
        .map(|c| {
          (
            c.composite_id(),
            c.source.clone(),
            encode::encode_kind(c.kind),
            c.record_id.clone(),
            c.created_epoch_ms,
            c.sort_key.as_ref().map(|k| k.as_str().to_string()),
          )
        })
        .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut post_stmt = tx.prepare(UPSERT_POST)?;
          let mut profile_stmt = tx.prepare(UPSERT_PROFILE)?;
          for (kind, rest_id, body, note) in record_rows {
            let stmt = match kind {
              RecordKind::Post => &mut post_stmt,
              RecordKind::Profile => &mut profile_stmt,
            };
            stmt.execute(rusqlite::params![
              rest_id,
              body,
              note.created_epoch_ms,
              note.updated_epoch_ms,
              note.media_count,
            ])?;
          }

          let mut capture_stmt = tx.prepare(UPSERT_CAPTURE)?;
          for (id, source, kind, record_id, epoch, sort_key) in capture_rows {
            capture_stmt.execute(rusqlite::params![
              id, source, kind, record_id, epoch, sort_key,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── SQL ─────────────────────────────────────────────────────────────────────

const UPSERT_POST: &str = "INSERT INTO posts
    (rest_id, body, created_epoch_ms, updated_epoch_ms, media_count)
  VALUES (?1, ?2, ?3, ?4, ?5)
  ON CONFLICT(rest_id) DO UPDATE SET
    body = excluded.body,
    created_epoch_ms = excluded.created_epoch_ms,
    updated_epoch_ms = excluded.updated_epoch_ms,
    media_count = excluded.media_count";

const UPSERT_PROFILE: &str = "INSERT INTO profiles
    (rest_id, body, created_epoch_ms, updated_epoch_ms, media_count)
  VALUES (?1, ?2, ?3, ?4, ?5)
  ON CONFLICT(rest_id) DO UPDATE SET
    body = excluded.body,
    created_epoch_ms = excluded.created_epoch_ms,
    updated_epoch_ms = excluded.updated_epoch_ms,
    media_count = excluded.media_count";

const UPSERT_CAPTURE: &str = "INSERT INTO captures
    (capture_id, source, kind, record_id, created_epoch_ms, sort_key)
  VALUES (?1, ?2, ?3, ?4, ?5, ?6)
  ON CONFLICT(capture_id) DO UPDATE SET
    source = excluded.source,
    kind = excluded.kind,
    record_id = excluded.record_id,
    created_epoch_ms = excluded.created_epoch_ms,
    sort_key = excluded.sort_key";

fn read_bodies(
  conn: &rusqlite::Connection,
  table: &str,
) -> rusqlite::Result<Vec<String>> {
  let mut stmt = conn.prepare(&format!("SELECT body FROM {table}"))?;
  let rows = stmt
    .query_map([], |row| row.get::<_, String>(0))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}
