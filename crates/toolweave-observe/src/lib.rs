//! Observability setup for toolweave: tracing subscriber and optional
//! OpenTelemetry export.

pub mod tracing_setup;
