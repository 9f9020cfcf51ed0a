use std::time::Duration;

use serde_json::{Value, json};

use toolweave_core::registry::ToolHandler;
use toolweave_types::error::ToolError;
use toolweave_types::tool::{CallerContext, SecurityPolicy, ToolDescriptor};

/// Upper bound for `sleep`, so a typo cannot park a workflow for hours.
const MAX_SLEEP_MS: u64 = 60_000;

pub struct Echo;

impl Echo {
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new("echo", "1.0.0")
            .with_description("Return the input unchanged")
            .with_category("util")
            .with_tags(["debug"])
            .with_security(SecurityPolicy {
                idempotent: true,
                ..Default::default()
            })
    }
}

impl ToolHandler for Echo {
    async fn execute(&self, input: Value, _caller: &CallerContext) -> Result<Value, ToolError> {
        Ok(input)
    }
}

pub struct Sleep;

impl Sleep {
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new("sleep", "1.0.0")
            .with_description("Wait for `ms` milliseconds")
            .with_category("util")
            .with_tags(["debug", "timing"])
            .with_input_schema(json!({
                "type": "object",
                "properties": {
                    "ms": { "type": "integer", "minimum": 0, "maximum": MAX_SLEEP_MS }
                },
                "required": ["ms"]
            }))
            .with_output_schema(json!({
                "type": "object",
                "properties": { "slept_ms": { "type": "integer" } },
                "required": ["slept_ms"]
            }))
            .with_security(SecurityPolicy {
                idempotent: true,
                ..Default::default()
            })
    }
}

impl ToolHandler for Sleep {
    async fn execute(&self, input: Value, _caller: &CallerContext) -> Result<Value, ToolError> {
        let ms = input["ms"].as_u64().unwrap_or(0).min(MAX_SLEEP_MS);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        Ok(json!({ "slept_ms": ms }))
    }
}
