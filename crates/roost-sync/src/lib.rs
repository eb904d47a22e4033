//! Push-only sync of captured posts into a vault.
//!
//! [`engine::SyncEngine`] performs one sync pass: project new captures into
//! date-bucketed JSONL notes and merge them into the vault, deduplicating by
//! post id. [`scheduler`] drives passes on an interval, gated on host
//! conditions and a single-flight guard.

pub mod engine;
mod error;
pub mod scheduler;

pub use engine::{SyncEngine, SyncSummary};
pub use error::{Error, Result};

#[cfg(test)]
mod tests;
