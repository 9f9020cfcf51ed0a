use serde_json::{Value, json};

use toolweave_core::registry::ToolHandler;
use toolweave_types::error::ToolError;
use toolweave_types::tool::{CallerContext, SecurityPolicy, ToolDependency, ToolDescriptor};

fn text_input_schema() -> Value {
    json!({
        "type": "object",
        "properties": { "text": { "type": "string" } },
        "required": ["text"]
    })
}

fn text_of<'a>(tool: &str, input: &'a Value) -> Result<&'a str, ToolError> {
    input["text"].as_str().ok_or_else(|| ToolError::Validation {
        tool: tool.to_string(),
        message: "$.text: expected string".to_string(),
    })
}

fn pure() -> SecurityPolicy {
    SecurityPolicy {
        idempotent: true,
        ..Default::default()
    }
}

pub struct TextUpper;

impl TextUpper {
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new("text.upper", "1.1.0")
            .with_description("Upper-case a string")
            .with_category("text")
            .with_tags(["transform"])
            .with_input_schema(text_input_schema())
            .with_output_schema(text_input_schema())
            .with_security(pure())
    }
}

impl ToolHandler for TextUpper {
    async fn execute(&self, input: Value, _caller: &CallerContext) -> Result<Value, ToolError> {
        Ok(json!({ "text": text_of("text.upper", &input)?.to_uppercase() }))
    }
}

pub struct TextWords;

impl TextWords {
    pub fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new("text.words", "1.0.0")
            .with_description("Split a string on whitespace")
            .with_category("text")
            .with_tags(["transform", "analysis"])
            .with_input_schema(text_input_schema())
            .with_output_schema(json!({
                "type": "object",
                "properties": {
                    "words": { "type": "array", "items": { "type": "string" } },
                    "count": { "type": "integer", "minimum": 0 }
                },
                "required": ["words", "count"]
            }))
            .with_dependency(ToolDependency::required("text.upper", "^1.0.0"))
            .with_security(pure())
    }
}

impl ToolHandler for TextWords {
    async fn execute(&self, input: Value, _caller: &CallerContext) -> Result<Value, ToolError> {
        let words: Vec<&str> = text_of("text.words", &input)?.split_whitespace().collect();
        Ok(json!({ "count": words.len(), "words": words }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upper() {
        let out = TextUpper
            .execute(json!({"text": "straße"}), &CallerContext::default())
            .await
            .unwrap();
        assert_eq!(out, json!({"text": "STRASSE"}));
    }

    #[tokio::test]
    async fn test_words() {
        let out = TextWords
            .execute(json!({"text": "  one two\tthree\n"}), &CallerContext::default())
            .await
            .unwrap();
        assert_eq!(out, json!({"words": ["one", "two", "three"], "count": 3}));
    }

    #[tokio::test]
    async fn test_missing_text_is_validation_error() {
        let err = TextWords.execute(json!({}), &CallerContext::default()).await.unwrap_err();
        assert!(matches!(err, ToolError::Validation { .. }));
    }
}
