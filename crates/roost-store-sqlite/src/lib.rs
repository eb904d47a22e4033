//! SQLite backend for the Roost capture store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime. The schema is versioned via
//! `PRAGMA user_version` and an append-only migration list.

mod encode;
mod store;

pub mod error;
pub mod schema;

pub use error::{Error, Result};
pub use store::SqliteStore;
