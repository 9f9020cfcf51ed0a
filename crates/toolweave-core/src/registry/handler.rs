//! Executable side of a registered tool.
//!
//! `ToolHandler` uses RPITIT, so it cannot be a trait object directly. The
//! catalog stores handlers through the usual three-part wrapper:
//! 1. An object-safe `ToolHandlerDyn` trait with boxed futures
//! 2. A blanket impl of `ToolHandlerDyn` for every `T: ToolHandler`
//! 3. `BoxToolHandler` wraps `Box<dyn ToolHandlerDyn>` and delegates

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;

use toolweave_types::error::ToolError;
use toolweave_types::tool::CallerContext;

/// The one behavior a tool must supply: turn validated input into output.
pub trait ToolHandler: Send + Sync {
    fn execute(
        &self,
        input: Value,
        caller: &CallerContext,
    ) -> impl Future<Output = Result<Value, ToolError>> + Send;
}

/// Object-safe version of [`ToolHandler`] with boxed futures.
pub trait ToolHandlerDyn: Send + Sync {
    fn execute_boxed<'a>(
        &'a self,
        input: Value,
        caller: &'a CallerContext,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + 'a>>;
}

impl<T: ToolHandler> ToolHandlerDyn for T {
    fn execute_boxed<'a>(
        &'a self,
        input: Value,
        caller: &'a CallerContext,
    ) -> Pin<Box<dyn Future<Output = Result<Value, ToolError>> + Send + 'a>> {
        Box::pin(self.execute(input, caller))
    }
}

/// Type-erased handler stored in the catalog.
pub struct BoxToolHandler {
    inner: Box<dyn ToolHandlerDyn + Send + Sync>,
}

impl BoxToolHandler {
    pub fn new<T: ToolHandler + 'static>(handler: T) -> Self {
        Self {
            inner: Box::new(handler),
        }
    }

    pub async fn execute(&self, input: Value, caller: &CallerContext) -> Result<Value, ToolError> {
        self.inner.execute_boxed(input, caller).await
    }
}

impl std::fmt::Debug for BoxToolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BoxToolHandler(<handler>)")
    }
}

// ---------------------------------------------------------------------------
// Closure adapter
// ---------------------------------------------------------------------------

/// Adapts an async closure `Fn(Value, CallerContext) -> Future` into a handler.
///
/// The caller context is cloned per call so the closure's future can be
/// `'static`-friendly.
pub struct FnTool<F> {
    f: F,
}

impl<F, Fut> FnTool<F>
where
    F: Fn(Value, CallerContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ToolError>> + Send,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> ToolHandler for FnTool<F>
where
    F: Fn(Value, CallerContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ToolError>> + Send,
{
    fn execute(
        &self,
        input: Value,
        caller: &CallerContext,
    ) -> impl Future<Output = Result<Value, ToolError>> + Send {
        (self.f)(input, caller.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Doubler;

    impl ToolHandler for Doubler {
        async fn execute(&self, input: Value, _caller: &CallerContext) -> Result<Value, ToolError> {
            let n = input
                .get("n")
                .and_then(Value::as_i64)
                .ok_or_else(|| ToolError::execution("missing n"))?;
            Ok(json!({ "n": n * 2 }))
        }
    }

    #[tokio::test]
    async fn test_boxed_struct_handler() {
        let handler = BoxToolHandler::new(Doubler);
        let out = handler
            .execute(json!({"n": 21}), &CallerContext::default())
            .await
            .unwrap();
        assert_eq!(out, json!({"n": 42}));
    }

    #[tokio::test]
    async fn test_fn_tool_sees_caller() {
        let handler = BoxToolHandler::new(FnTool::new(|_input, caller: CallerContext| async move {
            Ok(json!({ "user": caller.user_id }))
        }));
        let out = handler
            .execute(json!({}), &CallerContext::for_user("u-1"))
            .await
            .unwrap();
        assert_eq!(out, json!({"user": "u-1"}));
    }

    #[tokio::test]
    async fn test_handler_errors_pass_through() {
        let handler = BoxToolHandler::new(Doubler);
        let err = handler.execute(json!({}), &CallerContext::default()).await.unwrap_err();
        assert_eq!(err, ToolError::execution("missing n"));
    }
}
