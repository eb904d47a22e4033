//! The `CaptureStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g. `roost-store-sqlite`).
//! Higher layers (`roost-sync`) depend on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{
  capture::Capture,
  record::{Post, Profile, Record, RecordKind},
};

// ─── Supporting types ────────────────────────────────────────────────────────

/// Row counts across the three logical tables. All-or-nothing: a read
/// failure yields an error, never partial counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
  pub posts:    u64,
  pub profiles: u64,
  pub captures: u64,
}

/// Whole-store backup payload produced by `export_all`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreBackup {
  pub posts:    Vec<Post>,
  pub profiles: Vec<Profile>,
  pub captures: Vec<Capture>,
}

impl StoreBackup {
  /// Serialise the backup for storage outside the store.
  pub fn to_json(&self) -> crate::Result<String> {
    Ok(serde_json::to_string(self)?)
  }

  pub fn from_json(raw: &str) -> crate::Result<Self> {
    Ok(serde_json::from_str(raw)?)
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Roost capture store backend.
///
/// Batch writes are atomic per call per table: an upsert either fully
/// applies or fully fails, leaving prior state untouched. There is no
/// cross-table transaction spanning records and captures; a capture whose
/// record is missing is filtered at read time.
///
/// All methods return `Send` futures so the trait can be used from
/// multi-threaded async runtimes.
pub trait CaptureStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Writes ────────────────────────────────────────────────────────────

  /// Upsert a batch of records keyed by `rest_id`, recomputing each
  /// record's annotation block.
  fn upsert_records(
    &self,
    records: Vec<Record>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Upsert a batch of captures keyed by composite id; existing entries
  /// with the same key are overwritten.
  fn upsert_captures(
    &self,
    captures: Vec<Capture>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// All captures for a source, unordered at the storage layer.
  fn captures_for_source<'a>(
    &'a self,
    source: &'a str,
  ) -> impl Future<Output = Result<Vec<Capture>, Self::Error>> + Send + 'a;

  /// Captures for a source with a creation epoch strictly greater than
  /// `since_epoch_ms`.
  fn captures_for_source_since<'a>(
    &'a self,
    source: &'a str,
    since_epoch_ms: i64,
  ) -> impl Future<Output = Result<Vec<Capture>, Self::Error>> + Send + 'a;

  /// Resolve the records a capture list references, in source order
  /// (see [`crate::capture::source_order`]). Captures of another kind, or
  /// whose record is missing or structurally invalid, are dropped; the
  /// drop is a logged data-integrity warning, not an error.
  fn records_for_captures<'a>(
    &'a self,
    captures: &'a [Capture],
    kind: RecordKind,
  ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send + 'a;

  /// Row counts for all three tables.
  fn count(
    &self,
  ) -> impl Future<Output = Result<StoreCounts, Self::Error>> + Send + '_;

  // ── Bulk lifecycle ────────────────────────────────────────────────────

  /// Delete all captures for a source. Records are left alone — they may
  /// be shared with other sources.
  fn clear_source<'a>(
    &'a self,
    source: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Delete the contents of all three tables.
  fn clear_all(
    &self,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Whole-store snapshot for backup. Best-effort: structurally invalid
  /// rows are skipped with a warning.
  fn export_all(
    &self,
  ) -> impl Future<Output = Result<StoreBackup, Self::Error>> + Send + '_;

  /// Restore a backup produced by [`CaptureStore::export_all`], preserving
  /// annotation blocks as exported.
  fn import_all(
    &self,
    backup: StoreBackup,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
