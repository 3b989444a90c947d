//! Shared handler state.
//!
//! Everything request handlers need is constructed once at startup and
//! passed in here; there are no module-level globals to reach for.

use std::sync::Arc;

use catalog_store::CatalogStore;
use opentelemetry::global::BoxedTracer;
use opentelemetry::metrics::Counter;

use crate::auth::DelayPicker;
use crate::telemetry::CorrelatedLogger;

#[derive(Clone)]
pub struct AppState {
    pub store: CatalogStore,
    pub tracer: Arc<BoxedTracer>,
    pub logger: Arc<CorrelatedLogger>,
    /// Monotonic count of authorization checks, incremented once per
    /// check regardless of outcome.
    pub auth_attempts: Counter<u64>,
    pub delay: Arc<dyn DelayPicker>,
}
