//! SQLite storage layer.
//!
//! WAL-mode database with split read/write connection pools; currently holds
//! the persisted tool flags.

pub mod flags;
pub mod pool;
