//! Opaque sort keys supplied by capture sources.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// An opaque ordering value emitted by a capture source to express its
/// native ordering (e.g. a timeline cursor), distinct from wall-clock
/// timestamps.
///
/// Keys compare by byte length first, then lexicographically — numeric order
/// for the unsigned decimal cursor strings sources emit, without assuming
/// they fit any integer width.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SortKey(String);

impl SortKey {
  pub fn new(raw: impl Into<String>) -> Self {
    Self(raw.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl Ord for SortKey {
  fn cmp(&self, other: &Self) -> Ordering {
    self
      .0
      .len()
      .cmp(&other.0.len())
      .then_with(|| self.0.cmp(&other.0))
  }
}

impl PartialOrd for SortKey {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}
