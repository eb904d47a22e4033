//! Record types — the persisted domain entities (posts and profiles).
//!
//! A record is immutable by identity: the external `rest_id` never changes,
//! and an upsert with the same id replaces the whole row. The private
//! annotation block is recomputed on every upsert, never left partially
//! stale.

use serde::{Deserialize, Serialize};

use crate::timefmt;

/// Which logical table a record lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
  Post,
  Profile,
}

// ─── Post sub-types ──────────────────────────────────────────────────────────

/// Post author, denormalised onto the post at capture time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
  pub rest_id:      String,
  /// Screen name without the leading `@`.
  pub handle:       String,
  pub display_name: String,
}

/// Flattened engagement counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Engagement {
  pub favorites: u64,
  pub reposts:   u64,
  pub replies:   u64,
  pub quotes:    u64,
  pub bookmarks: u64,
  /// Not reported by the source for older posts.
  pub views:     Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
  Photo,
  Video,
  Gif,
}

/// One encoding of a video or animated attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaVariant {
  /// Absent for streaming manifests.
  pub bitrate:      Option<u64>,
  pub content_type: String,
  pub url:          String,
}

/// A media attachment on a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
  pub kind:     MediaKind,
  /// Static URL: the image itself for photos, the poster frame otherwise.
  pub url:      String,
  #[serde(default)]
  pub variants: Vec<MediaVariant>,
}

impl MediaItem {
  /// Canonical downloadable URL. Photos resolve to `url` directly; videos
  /// and GIFs pick the highest-bitrate variant, falling back to the poster
  /// frame when no variant is usable.
  pub fn canonical_url(&self) -> &str {
    match self.kind {
      MediaKind::Photo => &self.url,
      MediaKind::Video | MediaKind::Gif => self
        .variants
        .iter()
        .filter(|v| v.bitrate.is_some())
        .max_by_key(|v| v.bitrate)
        .map(|v| v.url.as_str())
        .unwrap_or(&self.url),
    }
  }
}

// ─── Annotations ─────────────────────────────────────────────────────────────

/// Private block derived at persistence time. Recomputed as a whole on every
/// upsert.
#[derive(
  Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize,
)]
pub struct Annotations {
  /// Epoch ms parsed from the record's source-format timestamp.
  pub created_epoch_ms: i64,
  /// Epoch ms of the most recent upsert.
  pub updated_epoch_ms: i64,
  pub media_count:      u32,
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// A captured timeline post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
  pub rest_id:    String,
  /// Source-format timestamp string, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
  pub created_at: String,
  pub text:       String,
  pub author:     Author,
  pub metrics:    Engagement,
  #[serde(default)]
  pub media:      Vec<MediaItem>,
  #[serde(default)]
  pub reply_to:   Option<String>,
  #[serde(default)]
  pub repost_of:  Option<String>,
  #[serde(default)]
  pub quote_of:   Option<String>,
  #[serde(default)]
  pub note:       Annotations,
}

impl Post {
  /// Canonical permalink for the post.
  pub fn permalink(&self) -> String {
    format!("https://x.com/{}/status/{}", self.author.handle, self.rest_id)
  }
}

/// A captured user profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub rest_id:      String,
  pub handle:       String,
  pub display_name: String,
  #[serde(default)]
  pub bio:          String,
  /// Account creation timestamp in the source format.
  pub created_at:   String,
  pub followers:    u64,
  pub following:    u64,
  pub post_count:   u64,
  #[serde(default)]
  pub avatar_url:   Option<String>,
  #[serde(default)]
  pub note:         Annotations,
}

/// A persisted record of either kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum Record {
  Post(Post),
  Profile(Profile),
}

impl Record {
  pub fn kind(&self) -> RecordKind {
    match self {
      Record::Post(_) => RecordKind::Post,
      Record::Profile(_) => RecordKind::Profile,
    }
  }

  /// The stable external identifier the record is keyed by.
  pub fn rest_id(&self) -> &str {
    match self {
      Record::Post(p) => &p.rest_id,
      Record::Profile(p) => &p.rest_id,
    }
  }

  pub fn note(&self) -> &Annotations {
    match self {
      Record::Post(p) => &p.note,
      Record::Profile(p) => &p.note,
    }
  }

  /// Recompute the private annotation block in place. `now_ms` becomes the
  /// last-write stamp.
  pub fn annotate(&mut self, now_ms: i64) {
    match self {
      Record::Post(p) => {
        p.note = Annotations {
          created_epoch_ms: timefmt::parse_source(&p.created_at)
            .timestamp_millis(),
          updated_epoch_ms: now_ms,
          media_count:      p.media.len() as u32,
        };
      }
      Record::Profile(p) => {
        p.note = Annotations {
          created_epoch_ms: timefmt::parse_source(&p.created_at)
            .timestamp_millis(),
          updated_epoch_ms: now_ms,
          media_count:      0,
        };
      }
    }
  }
}
