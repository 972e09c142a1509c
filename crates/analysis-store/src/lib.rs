//! SQLite persistence for instruments, bars, features, news and analysis runs.
//!
//! Market data is append-mostly: every write path checks the natural key
//! before inserting and never overwrites an existing row.

pub mod db;
pub mod error;
pub mod instruments;
pub mod market;
pub mod models;
pub mod news;
pub mod runs;

pub use db::{AnalysisDb, DEFAULT_DATABASE_URL};
pub use error::{StoreError, StoreResult};
pub use instruments::normalize_ticker;
pub use models::*;
pub use runs::{truncate_error, MAX_ERROR_CHARS};
