//! Core types and trait definitions for the Roost capture store.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod capture;
pub mod error;
pub mod ingest;
pub mod ordering;
pub mod project;
pub mod record;
pub mod store;
pub mod timefmt;

pub use error::{Error, Result};
