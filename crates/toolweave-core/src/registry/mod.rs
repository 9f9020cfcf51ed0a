//! Tool registry and dependency resolver.

pub mod catalog;
pub mod flags;
pub mod graph;
pub mod handler;
pub mod invoke;

pub use catalog::{RegisteredTool, ToolFlags, ToolRegistry};
pub use handler::{BoxToolHandler, FnTool, ToolHandler};
pub use invoke::Invocation;
