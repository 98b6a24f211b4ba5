//! Database Backend Abstractions
//!
//! The ORM reaches storage only through the traits in `core`; `sqlite`
//! provides the embedded implementation.

pub mod core;
pub mod sqlite;

pub use core::*;
pub use sqlite::SqliteDatastore;
