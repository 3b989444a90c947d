//! Telemetry for the catalog server.
//!
//! Provides OpenTelemetry-based observability with:
//! - Tracing (distributed traces, OTLP batch export)
//! - Metrics (the auth-attempt counter, OTLP periodic export)
//! - W3C Trace Context + Baggage propagation
//! - Correlated JSON logging (trace/span ids and baggage on every entry)

pub mod baggage;
mod init;
pub mod logging;
mod propagation;

pub use catalog_store::trace::{SpanScope, start_span};
pub use init::{Telemetry, TelemetryGuard, init_propagator, init_telemetry, resource};
pub use logging::CorrelatedLogger;
pub use propagation::{RequestContext, extract_context, trace_context};
