//! W3C Trace Context and Baggage propagation for HTTP.
//!
//! Extracts trace context and baggage from inbound request headers and
//! attaches them, together with a server span, to the request's
//! extensions so handlers can open child spans and correlate logs.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use opentelemetry::trace::SpanKind;
use opentelemetry::{Context, KeyValue, global};
use opentelemetry::propagation::Extractor;

use crate::state::AppState;

use super::start_span;

/// The per-request context value: trace context and baggage from the
/// inbound headers, plus the server span opened for this request.
#[derive(Clone)]
pub struct RequestContext(pub Context);

/// Extracts trace context and baggage from incoming request headers
/// using the globally installed composite propagator.
pub fn extract_context(headers: &HeaderMap) -> Context {
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderExtractor(headers)))
}

/// Middleware run on every request: extract the inbound context, open a
/// server span named after the method and path, and make the resulting
/// context available to the handler. The span is closed by the scope
/// guard on every exit path and records the response status first.
pub async fn trace_context(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let parent = extract_context(request.headers());
    let name = format!("{} {}", request.method(), request.uri().path());
    let scope = start_span(&state.tracer, &parent, name, SpanKind::Server);
    scope
        .span()
        .set_attribute(KeyValue::new("http.method", request.method().to_string()));
    scope
        .span()
        .set_attribute(KeyValue::new("http.target", request.uri().path().to_string()));

    request
        .extensions_mut()
        .insert(RequestContext(scope.context().clone()));

    let response = next.run(request).await;

    scope.span().set_attribute(KeyValue::new(
        "http.status_code",
        i64::from(response.status().as_u16()),
    ));
    response
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|key| key.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::init_propagator;
    use axum::http::{HeaderName, HeaderValue};
    use opentelemetry::baggage::BaggageExt;
    use opentelemetry::trace::TraceContextExt;

    const TRACEPARENT: &str = "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01";

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (key, value) in pairs {
            headers.insert(
                HeaderName::from_bytes(key.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn extracts_w3c_trace_context() {
        init_propagator();
        let cx = extract_context(&headers(&[("traceparent", TRACEPARENT)]));
        let span_context = cx.span().span_context().clone();
        assert!(span_context.is_valid());
        assert!(span_context.is_remote());
        assert_eq!(
            span_context.trace_id().to_string(),
            "0af7651916cd43dd8448eb211c80319c"
        );
        assert_eq!(span_context.span_id().to_string(), "b7ad6b7169203331");
    }

    #[test]
    fn extracts_baggage_members() {
        init_propagator();
        let cx = extract_context(&headers(&[
            ("traceparent", TRACEPARENT),
            ("baggage", "userId=alice,serverNode=DF28"),
        ]));
        let baggage = cx.baggage();
        assert_eq!(baggage.get("userId").map(|v| v.to_string()), Some("alice".to_string()));
        assert_eq!(
            baggage.get("serverNode").map(|v| v.to_string()),
            Some("DF28".to_string())
        );
    }

    #[test]
    fn missing_headers_yield_no_active_span() {
        init_propagator();
        let cx = extract_context(&HeaderMap::new());
        assert!(!cx.span().span_context().is_valid());
    }
}
