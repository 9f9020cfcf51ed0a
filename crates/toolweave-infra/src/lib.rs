//! Infrastructure layer for toolweave.
//!
//! Implements the ports defined in `toolweave-core`: configuration loading
//! from the data directory, a SQLite-backed flag store, and the built-in
//! tools the CLI registers at startup.

pub mod builtin;
pub mod config;
pub mod sqlite;
