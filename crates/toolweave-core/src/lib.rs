//! Core of toolweave: the tool registry, retry engine, and workflow engine.
//!
//! This crate holds no I/O of its own. Persistence goes through the
//! [`storage::flag_store::FlagStore`] port, implemented in `toolweave-infra`.

pub mod graph;
pub mod registry;
pub mod retry;
pub mod schema;
pub mod storage;
pub mod version;
pub mod workflow;
