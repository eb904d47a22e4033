//! Encoding and decoding helpers between domain types and SQLite columns.
//!
//! Record payloads are stored as full JSON bodies; annotation fields are
//! duplicated into plain columns so they can be indexed. Captures are stored
//! column-per-field with the sort key as its raw string.

use roost_core::{
  capture::Capture,
  ordering::SortKey,
  record::{Record, RecordKind},
};

use crate::{Error, Result};

// ─── RecordKind ──────────────────────────────────────────────────────────────

pub fn encode_kind(kind: RecordKind) -> &'static str {
  match kind {
    RecordKind::Post => "post",
    RecordKind::Profile => "profile",
  }
}

pub fn decode_kind(raw: &str) -> Result<RecordKind> {
  match raw {
    "post" => Ok(RecordKind::Post),
    "profile" => Ok(RecordKind::Profile),
    other => Err(Error::Decode(format!("unknown record kind: {other:?}"))),
  }
}

/// The table a record kind lives in.
pub fn table_for(kind: RecordKind) -> &'static str {
  match kind {
    RecordKind::Post => "posts",
    RecordKind::Profile => "profiles",
  }
}

// ─── Record bodies ───────────────────────────────────────────────────────────

/// Decode a stored record body. Empty or structurally invalid payloads
/// yield `None` so read paths can drop them; the caller logs the integrity
/// warning.
pub fn decode_record_body(body: &str) -> Option<Record> {
  if body.trim().is_empty() {
    return None;
  }
  serde_json::from_str(body).ok()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `captures` row.
pub struct RawCapture {
  pub source:           String,
  pub kind:             String,
  pub record_id:        String,
  pub created_epoch_ms: i64,
  pub sort_key:         Option<String>,
}

impl RawCapture {
  pub fn into_capture(self) -> Result<Capture> {
    Ok(Capture {
      source:           self.source,
      kind:             decode_kind(&self.kind)?,
      record_id:        self.record_id,
      created_epoch_ms: self.created_epoch_ms,
      sort_key:         self.sort_key.map(SortKey::new),
    })
  }
}
