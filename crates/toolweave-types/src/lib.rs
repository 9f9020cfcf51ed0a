//! Shared domain types for toolweave.
//!
//! This crate contains the serializable types used across the registry and
//! workflow engine: tool descriptors, security policies, retry policies,
//! workflow manifests, run status, configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod config;
pub mod error;
pub mod retry;
pub mod tool;
pub mod workflow;
