//! Batch ingest — the single write entry point used by capture producers.

use std::cmp::Ordering;

use crate::{
  capture::Capture, ordering::SortKey, record::Record, store::CaptureStore,
  timefmt,
};

/// One observed record plus its optional source-native position.
#[derive(Debug, Clone)]
pub struct CapturedItem {
  pub record:   Record,
  pub sort_key: Option<SortKey>,
}

impl CapturedItem {
  pub fn new(record: Record, sort_key: Option<SortKey>) -> Self {
    Self { record, sort_key }
  }
}

/// Persist a batch of observed records and their provenance.
///
/// The batch is sorted by source order (keyed entries ascending, ahead of
/// unkeyed ones; unkeyed entries keep their submitted order), then each
/// capture is stamped with `now + index` so batch order survives wall-clock
/// collisions. Records are upserted first, then captures; a crash between
/// the two leaves an inert record, which read paths tolerate.
///
/// Returns the number of captures written. Duplicate record ids within one
/// batch collapse to a single capture (last write wins).
pub async fn add_captured<S: CaptureStore>(
  store: &S,
  source: &str,
  mut items: Vec<CapturedItem>,
) -> Result<usize, S::Error> {
  if items.is_empty() {
    return Ok(0);
  }

  // Stable sort: unkeyed entries stay in submission order.
  items.sort_by(|a, b| match (&a.sort_key, &b.sort_key) {
    (Some(x), Some(y)) => x.cmp(y),
    (Some(_), None) => Ordering::Less,
    (None, Some(_)) => Ordering::Greater,
    (None, None) => Ordering::Equal,
  });

  let now = timefmt::now_ms();
  let mut records = Vec::with_capacity(items.len());
  let mut captures = Vec::with_capacity(items.len());

  for (i, item) in items.into_iter().enumerate() {
    captures.push(Capture {
      source:           source.to_string(),
      kind:             item.record.kind(),
      record_id:        item.record.rest_id().to_string(),
      created_epoch_ms: now + i as i64,
      sort_key:         item.sort_key,
    });
    records.push(item.record);
  }

  let written = captures.len();
  store.upsert_records(records).await?;
  store.upsert_captures(captures).await?;

  tracing::debug!(source, count = written, "captured batch persisted");
  Ok(written)
}
