//! Pure projection from stored posts to the exported document shape.
//!
//! Deterministic, no I/O, no side effects. One [`ExportedPost`] becomes one
//! JSONL line in a bucket file.

use serde::{Deserialize, Serialize};

use crate::{
  record::{Engagement, Post},
  timefmt,
};

/// Fixed source tag stamped on every exported document.
pub const SOURCE_TAG: &str = "roost";

/// Referenced-content identifiers carried alongside an exported post.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedContext {
  pub reply_to:  Option<String>,
  pub repost_of: Option<String>,
  pub quote_of:  Option<String>,
}

/// One line of a bucket file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedPost {
  pub id:            String,
  /// RFC 3339; the Unix epoch when the source timestamp is unparseable.
  pub created_at:    String,
  pub author_handle: String,
  pub author_name:   String,
  pub text:          String,
  pub url:           String,
  /// Media resolved to canonical URLs.
  pub media:         Vec<String>,
  pub metrics:       Engagement,
  pub context:       ExportedContext,
  pub source:        String,
}

/// Project a stored post into its external-facing document shape.
pub fn project(post: &Post) -> ExportedPost {
  ExportedPost {
    id:            post.rest_id.clone(),
    created_at:    timefmt::parse_source(&post.created_at).to_rfc3339(),
    author_handle: post.author.handle.clone(),
    author_name:   post.author.display_name.clone(),
    text:          post.text.clone(),
    url:           post.permalink(),
    media:         post
      .media
      .iter()
      .map(|m| m.canonical_url().to_string())
      .collect(),
    metrics:       post.metrics,
    context:       ExportedContext {
      reply_to:  post.reply_to.clone(),
      repost_of: post.repost_of.clone(),
      quote_of:  post.quote_of.clone(),
    },
    source:        SOURCE_TAG.to_string(),
  }
}

/// The bucket a post's exported document belongs to: the UTC calendar date
/// of its creation timestamp.
pub fn bucket_key(post: &Post) -> String {
  timefmt::bucket_key(timefmt::parse_source(&post.created_at))
}
