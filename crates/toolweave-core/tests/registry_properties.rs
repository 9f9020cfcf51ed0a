//! Registry-level properties: acyclicity atomicity, version satisfaction,
//! and the fetch/transform end-to-end run.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::{Value, json};

use toolweave_core::registry::{FnTool, ToolHandler, ToolRegistry};
use toolweave_core::version::satisfies;
use toolweave_core::workflow::{WorkflowDefinition, WorkflowEngine, WorkflowStep};
use toolweave_types::error::ToolError;
use toolweave_types::tool::{CallerContext, ToolDependency, ToolDescriptor, ToolFilter};
use toolweave_types::workflow::StepStatus;

fn passthrough() -> impl ToolHandler + 'static {
    FnTool::new(|input: Value, _caller: CallerContext| std::future::ready(Ok(input)))
}

#[tokio::test]
async fn cyclic_registration_leaves_catalog_untouched() {
    let registry = ToolRegistry::default();
    registry.try_register(ToolDescriptor::new("a", "1.0.0"), passthrough()).await.unwrap();
    registry
        .try_register(
            ToolDescriptor::new("b", "1.0.0")
                .with_dependency(ToolDependency::required("a", "^1.0.0")),
            passthrough(),
        )
        .await
        .unwrap();
    registry
        .try_register(
            ToolDescriptor::new("c", "1.0.0").with_dependency(ToolDependency::required("b", "*")),
            passthrough(),
        )
        .await
        .unwrap();

    let tools_before = registry.list_tools(&ToolFilter::default()).await;
    let stats_before = registry.get_stats().await;

    // a@1.1.0 -> c -> b -> a closes a loop.
    let err = registry
        .try_register(
            ToolDescriptor::new("a", "1.1.0").with_dependency(ToolDependency::required("c", "*")),
            passthrough(),
        )
        .await
        .unwrap_err();
    match err {
        ToolError::Cycle(path) => {
            assert_eq!(path.first(), path.last());
            for name in ["a", "b", "c"] {
                assert!(path.iter().any(|p| p == name), "{name} missing from {path:?}");
            }
        }
        other => panic!("expected a cycle error, got {other:?}"),
    }

    assert_eq!(registry.list_tools(&ToolFilter::default()).await, tools_before);
    assert_eq!(registry.get_stats().await.total_versions, stats_before.total_versions);
    assert_eq!(registry.resolve("a").await.unwrap().version.to_string(), "1.0.0");
}

#[test]
fn version_satisfaction_follows_semver_precedence() {
    let table = [
        ("1.4.2", "^1.0.0", true),
        ("2.0.0", "^1.0.0", false),
        ("1.2.5", "~1.2.0", true),
        ("1.3.0", "~1.2.0", false),
        ("1.2.3", "1.2.3", true),
        ("1.2.4", "1.2.3", false),
        ("0.2.5", "^0.2.0", true),
        ("0.3.0", "^0.2.0", false),
        ("1.5.0", ">=1.2.0, <2.0.0", true),
        ("2.1.0", "^1.0.0 || ^2.0.0", true),
        ("3.0.0", "1.x", false),
        ("9.9.9", "*", true),
        ("1.0.0-beta.1", "^1.0.0", false),
    ];
    for (version, range, expected) in table {
        assert_eq!(
            satisfies(version, range).unwrap(),
            expected,
            "satisfies({version:?}, {range:?})"
        );
    }
    assert!(satisfies("1.0", "^1.0.0").is_err());
    assert!(satisfies("1.0.0", "1.0.0 - 2.0.0").is_err());
}

#[tokio::test]
async fn fetch_then_transform_end_to_end() {
    let registry = Arc::new(ToolRegistry::default());
    let fetch_calls = Arc::new(AtomicU32::new(0));
    let fetched = Arc::clone(&fetch_calls);

    registry
        .try_register(
            ToolDescriptor::new("fetch", "1.2.0"),
            FnTool::new(move |_input: Value, _caller: CallerContext| {
                fetched.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Ok::<_, ToolError>(json!({"items": ["x", "y"]})))
            }),
        )
        .await
        .unwrap();
    let report = registry
        .try_register(
            ToolDescriptor::new("transform", "1.0.0")
                .with_dependency(ToolDependency::required("fetch", "^1.0.0")),
            FnTool::new(|input: Value, _caller: CallerContext| async move {
                let count = input["value"]["items"].as_array().map_or(0, Vec::len);
                Ok::<_, ToolError>(json!({ "count": count, "source": input["value"] }))
            }),
        )
        .await
        .unwrap();
    assert!(report.warnings.is_empty());
    assert!(registry.resolve_dependencies("transform").await.unwrap().satisfied);

    let def = WorkflowDefinition::new("fetch-transform")
        .step(WorkflowStep::new("a", "fetch"))
        .step(
            WorkflowStep::new("b", "transform")
                .depends_on(["a"])
                .with_input_fn(|ctx| json!({ "value": ctx.result("a").cloned() })),
        );

    let outcome = WorkflowEngine::new(Arc::clone(&registry))
        .execute(&def, CallerContext::default(), json!({}))
        .await
        .unwrap();

    assert!(outcome.is_completed(), "{:?}", outcome.error);
    assert_eq!(fetch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.step("a").unwrap().status, StepStatus::Completed);
    let expected = json!({"count": 2, "source": {"items": ["x", "y"]}});
    assert_eq!(outcome.context.result("b"), Some(&expected));
    assert_eq!(outcome.output, Some(expected));

    let stats = registry.get_stats().await;
    assert_eq!(stats.per_tool["fetch"].successes, 1);
    assert_eq!(stats.per_tool["transform"].invocations, 1);
}
