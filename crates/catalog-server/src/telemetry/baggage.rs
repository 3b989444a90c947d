//! Baggage correlation.
//!
//! Baggage is read-only relative to inbound data: members are mirrored
//! verbatim onto spans and log entries, keyed by the literal member key,
//! and never synthesized or mutated here.

use opentelemetry::Context;
use opentelemetry::baggage::BaggageExt;
use opentelemetry::trace::SpanRef;
use opentelemetry::{KeyValue, Value};

/// Sets every baggage member of `cx` as a string attribute on `span`.
pub fn mirror_to_span(cx: &Context, span: &SpanRef<'_>) {
    for (key, (value, _metadata)) in cx.baggage().iter() {
        span.set_attribute(KeyValue::new(
            key.clone(),
            Value::String(value.clone()),
        ));
    }
}

/// Merges every baggage member of `cx` into a log entry's field map.
pub fn mirror_to_fields(cx: &Context, fields: &mut serde_json::Map<String, serde_json::Value>) {
    for (key, (value, _metadata)) in cx.baggage().iter() {
        fields.insert(
            key.to_string(),
            serde_json::Value::String(value.to_string()),
        );
    }
}
