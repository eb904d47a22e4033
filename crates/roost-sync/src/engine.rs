//! One sync pass: captures → date buckets → merged vault notes.
//!
//! Buckets are independent. Each is read, merged, and written back in one
//! round trip; a failed bucket is recorded in the summary and never blocks
//! the others. Merging appends only — lines already in the note are never
//! rewritten, so vault-side edits to past lines survive a resync.

use std::collections::{BTreeMap, HashSet};

use roost_core::{
  project::{self, ExportedPost},
  record::{Record, RecordKind},
  store::CaptureStore,
};
use roost_vault::VaultClient;

use crate::{Error, Result};

/// Outcome of a full sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
  /// Posts considered by this pass.
  pub total:   usize,
  /// Posts newly appended to a note.
  pub synced:  usize,
  /// Posts already present in their note.
  pub skipped: usize,
  /// Notes written.
  pub files:   usize,
  /// One entry per failed bucket; the pass itself still succeeds.
  pub errors:  Vec<String>,
}

struct BucketOutcome {
  synced:  usize,
  skipped: usize,
  wrote:   bool,
}

/// Projects new captures from one source and merges them into the vault.
pub struct SyncEngine<S> {
  store:  S,
  vault:  VaultClient,
  source: String,
}

impl<S: CaptureStore> SyncEngine<S> {
  pub fn new(store: S, vault: VaultClient, source: impl Into<String>) -> Self {
    Self { store, vault, source: source.into() }
  }

  pub fn source(&self) -> &str {
    &self.source
  }

  /// Whether any capture for this source is newer than `since`. Lets the
  /// scheduler skip a quiet tick without starting a pass.
  pub async fn has_new_captures(&self, since_epoch_ms: i64) -> Result<bool> {
    let captures = self
      .store
      .captures_for_source_since(&self.source, since_epoch_ms)
      .await
      .map_err(Error::store)?;
    Ok(!captures.is_empty())
  }

  /// Run one sync pass over captures newer than `since` (all captures when
  /// `None`), writing into `folder/YYYY-MM-DD.jsonl` notes.
  pub async fn sync(
    &self,
    folder: &str,
    since: Option<i64>,
  ) -> Result<SyncSummary> {
    let captures = match since {
      Some(epoch_ms) => {
        self
          .store
          .captures_for_source_since(&self.source, epoch_ms)
          .await
      }
      None => self.store.captures_for_source(&self.source).await,
    }
    .map_err(Error::store)?;

    if captures.is_empty() {
      return Ok(SyncSummary::default());
    }

    let records = self
      .store
      .records_for_captures(&captures, RecordKind::Post)
      .await
      .map_err(Error::store)?;

    let mut buckets: BTreeMap<String, Vec<ExportedPost>> = BTreeMap::new();
    for record in &records {
      if let Record::Post(post) = record {
        buckets
          .entry(project::bucket_key(post))
          .or_default()
          .push(project::project(post));
      }
    }

    let mut summary = SyncSummary {
      total: buckets.values().map(Vec::len).sum(),
      ..SyncSummary::default()
    };

    for (day, posts) in &buckets {
      let path = format!("{folder}/{day}.jsonl");
      match self.sync_bucket(&path, posts).await {
        Ok(outcome) => {
          summary.synced += outcome.synced;
          summary.skipped += outcome.skipped;
          if outcome.wrote {
            summary.files += 1;
          }
        }
        Err(err) => {
          tracing::warn!(%path, error = %err, "bucket sync failed");
          summary.errors.push(format!("{path}: {err}"));
        }
      }
    }

    tracing::info!(
      source = %self.source,
      total = summary.total,
      synced = summary.synced,
      skipped = summary.skipped,
      files = summary.files,
      failed_buckets = summary.errors.len(),
      "sync pass finished"
    );
    Ok(summary)
  }

  /// Read-merge-write one bucket note. A missing note starts empty; posts
  /// whose id already appears on a line are skipped; nothing is written when
  /// there is nothing new.
  async fn sync_bucket(
    &self,
    path: &str,
    posts: &[ExportedPost],
  ) -> Result<BucketOutcome> {
    let existing = self.vault.read_note(path).await?.unwrap_or_default();
    let known = existing_ids(&existing);

    let mut outcome = BucketOutcome { synced: 0, skipped: 0, wrote: false };
    let mut appended = String::new();
    for post in posts {
      if known.contains(post.id.as_str()) {
        outcome.skipped += 1;
        continue;
      }
      appended.push_str(&serde_json::to_string(post)?);
      appended.push('\n');
      outcome.synced += 1;
    }

    if outcome.synced == 0 {
      return Ok(outcome);
    }

    let mut content = existing;
    if !content.is_empty() && !content.ends_with('\n') {
      content.push('\n');
    }
    content.push_str(&appended);
    self.vault.write_note(path, &content).await?;
    outcome.wrote = true;
    Ok(outcome)
  }
}

/// Post ids already present in a note. Any JSON line carrying a string `id`
/// field counts, so hand-edited or foreign lines still dedupe; unparseable
/// lines are ignored and left in place.
fn existing_ids(content: &str) -> HashSet<String> {
  content
    .lines()
    .filter_map(|line| {
      let line = line.trim();
      if line.is_empty() {
        return None;
      }
      let value: serde_json::Value = match serde_json::from_str(line) {
        Ok(value) => value,
        Err(_) => {
          tracing::debug!("leaving unparseable note line in place");
          return None;
        }
      };
      value.get("id")?.as_str().map(str::to_owned)
    })
    .collect()
}
