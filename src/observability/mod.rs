//! Observability infrastructure.
//!
//! Provides:
//! - Structured tracing to stderr, plain or JSON
//! - OpenTelemetry metrics for admissions, rejections and flushes

pub mod metrics;
pub mod tracing;
