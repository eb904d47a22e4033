//! Capture — a provenance entry linking a logical source and order position
//! to a record identifier.
//!
//! Captures reference records by id only. The reference is weak: a capture
//! may outlive or predate its record, deleting records never cascades, and
//! dangling captures are filtered at read time.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::{ordering::SortKey, record::RecordKind};

/// "Logical source S observed record R at position P."
///
/// At most one capture exists per (source, record id) pair; a re-capture
/// overwrites in place, though its epoch and sort key may update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
  pub source:           String,
  pub kind:             RecordKind,
  pub record_id:        String,
  /// Epoch ms, biased by intra-batch sequence so batch order survives
  /// wall-clock collisions.
  pub created_epoch_ms: i64,
  #[serde(default)]
  pub sort_key:         Option<SortKey>,
}

impl Capture {
  /// Composite storage key; the unit of overwrite for re-captures.
  pub fn composite_id(&self) -> String {
    format!("{}:{}", self.source, self.record_id)
  }
}

/// Source-native ordering of captures: explicit sort keys ascending when
/// both sides carry one; a keyed entry before an unkeyed one; otherwise
/// newest capture first.
pub fn source_order(a: &Capture, b: &Capture) -> Ordering {
  match (&a.sort_key, &b.sort_key) {
    (Some(x), Some(y)) => x.cmp(y),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => b.created_epoch_ms.cmp(&a.created_epoch_ms),
  }
}
