//! Scoped span helpers shared by the store and the server.
//!
//! A [`SpanScope`] owns the context carrying a freshly started span and
//! ends the span when dropped, so every exit path of the operation that
//! opened it (early returns and `?` included) closes it exactly once.

use std::borrow::Cow;

use opentelemetry::Context;
use opentelemetry::global::BoxedTracer;
use opentelemetry::trace::{SpanKind, SpanRef, TraceContextExt, Tracer};

/// Starts a child span of `parent` and wraps it in a guard that ends the
/// span on drop. The returned scope's context carries the new span and
/// should be passed to any nested work.
pub fn start_span(
    tracer: &BoxedTracer,
    parent: &Context,
    name: impl Into<Cow<'static, str>>,
    kind: SpanKind,
) -> SpanScope {
    let span = tracer
        .span_builder(name)
        .with_kind(kind)
        .start_with_context(tracer, parent);
    SpanScope {
        cx: parent.with_span(span),
    }
}

pub struct SpanScope {
    cx: Context,
}

impl SpanScope {
    pub fn context(&self) -> &Context {
        &self.cx
    }

    pub fn span(&self) -> SpanRef<'_> {
        self.cx.span()
    }
}

impl Drop for SpanScope {
    fn drop(&mut self) {
        self.cx.span().end();
    }
}
