//! SQLite backend for the nestmatch household engine.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every membership transition is a single
//! immediate transaction guarded by a compare-and-swap on the user row.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
