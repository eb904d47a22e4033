//! Error type for `roost-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] roost_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("column decode error: {0}")]
  Decode(String),

  /// A schema upgrade routine failed; the store open is aborted and no
  /// partial-version state is considered valid.
  #[error("migration to version {version} failed: {source}")]
  Migration {
    version: i64,
    source:  rusqlite::Error,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
