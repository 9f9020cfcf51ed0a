use serde_json::{Value, json};

use toolweave_core::registry::ToolHandler;
use toolweave_types::error::ToolError;
use toolweave_types::tool::{CallerContext, SecurityPolicy, ToolDescriptor};

/// Extract the value at a dotted path (`items.0.title`).
pub struct JsonPick;

impl JsonPick {
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new("json.pick", "1.0.0")
            .with_description("Extract the value at a dotted path")
            .with_category("json")
            .with_tags(["transform"])
            .with_input_schema(json!({
                "type": "object",
                "properties": {
                    "value": {},
                    "path": { "type": "string", "minLength": 1 }
                },
                "required": ["value", "path"]
            }))
            .with_security(SecurityPolicy {
                idempotent: true,
                ..Default::default()
            })
    }
}

impl ToolHandler for JsonPick {
    async fn execute(&self, input: Value, _caller: &CallerContext) -> Result<Value, ToolError> {
        let path = input["path"].as_str().unwrap_or_default();
        let mut current = &input["value"];
        for segment in path.split('.') {
            current = match current {
                Value::Object(map) => map.get(segment),
                Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            }
            .ok_or_else(|| {
                ToolError::execution(format!("path '{path}' not found at '{segment}'"))
            })?;
        }
        Ok(current.clone())
    }
}
