//! HTTP client for a vault's REST API.
//!
//! The vault exposes notes as files under `/vault/<path>`; this crate wraps
//! the two operations the sync engine needs — read a note (absent notes are
//! not an error) and write one — behind bearer-token auth.

mod client;
mod error;

pub use client::{VaultClient, VaultConfig};
pub use error::{Error, Result};
