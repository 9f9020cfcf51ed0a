//! Built-in tools registered by the CLI at startup.
//!
//! | Tool | Behavior |
//! |---|---|
//! | `echo` | returns its input unchanged |
//! | `text.upper` | `{text}` -> `{text}` upper-cased |
//! | `text.words` | `{text}` -> `{words, count}`; depends on `text.upper` |
//! | `json.pick` | `{value, path}` -> the value at a dotted path |
//! | `sleep` | `{ms}` -> waits, then `{slept_ms}` |

mod json;
mod text;
mod util;

use toolweave_core::registry::ToolRegistry;
use toolweave_types::tool::RegistrationReport;

pub use json::JsonPick;
pub use text::{TextUpper, TextWords};
pub use util::{Echo, Sleep};

/// Register every built-in tool. Returns one report per tool, in order.
pub async fn register_builtins(registry: &ToolRegistry) -> Vec<(String, RegistrationReport)> {
    let mut reports = Vec::new();

    let descriptor = Echo::descriptor();
    reports.push((descriptor.name.clone(), registry.register(descriptor, Echo).await));
    let descriptor = Sleep::descriptor();
    reports.push((descriptor.name.clone(), registry.register(descriptor, Sleep).await));
    let descriptor = TextUpper::descriptor();
    reports.push((descriptor.name.clone(), registry.register(descriptor, TextUpper).await));
    // After text.upper, which it declares as a dependency.
    let descriptor = TextWords::descriptor();
    reports.push((descriptor.name.clone(), registry.register(descriptor, TextWords).await));
    let descriptor = JsonPick::descriptor();
    reports.push((descriptor.name.clone(), registry.register(descriptor, JsonPick).await));

    let rejected = reports.iter().filter(|(_, r)| !r.accepted).count();
    tracing::debug!(tools = reports.len(), rejected, "registered built-in tools");
    reports
}
