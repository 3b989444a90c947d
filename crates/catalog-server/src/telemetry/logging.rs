//! Correlated JSON logging.
//!
//! Emits one JSON object per line. When the supplied context carries an
//! active span, the entry is enriched with `trace_id` / `span_id` and
//! with every baggage member of that context. Context state is captured
//! when the entry is formatted, which happens synchronously with the
//! call, so later handling of the line cannot observe stale identifiers.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use opentelemetry::Context;
use opentelemetry::trace::TraceContextExt;
use serde_json::{Map, Value};
use tracing::Level;

use super::baggage;

pub struct CorrelatedLogger {
    min_level: Level,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl CorrelatedLogger {
    /// Builds the process logger. A logfile path selects append/create
    /// output with fixed 0755 permissions; failure to open it must abort
    /// startup. Without a path, entries go to stdout.
    pub fn from_options(logfile: Option<&Path>, min_level: Level) -> io::Result<Self> {
        let writer: Box<dyn Write + Send> = match logfile {
            Some(path) => {
                let mut options = OpenOptions::new();
                options.create(true).append(true);
                #[cfg(unix)]
                {
                    use std::os::unix::fs::OpenOptionsExt;
                    options.mode(0o755);
                }
                Box::new(options.open(path)?)
            }
            None => Box::new(io::stdout()),
        };

        Ok(Self::with_writer(writer, min_level))
    }

    pub fn with_writer(writer: Box<dyn Write + Send>, min_level: Level) -> Self {
        Self {
            min_level,
            writer: Mutex::new(writer),
        }
    }

    pub fn info(&self, cx: &Context, message: &str) {
        self.log(Level::INFO, cx, message);
    }

    pub fn warn(&self, cx: &Context, message: &str) {
        self.log(Level::WARN, cx, message);
    }

    pub fn error(&self, cx: &Context, message: &str) {
        self.log(Level::ERROR, cx, message);
    }

    /// Entries below the configured minimum level are dropped before any
    /// formatting work; there is no per-entry override.
    fn log(&self, level: Level, cx: &Context, message: &str) {
        if level > self.min_level {
            return;
        }

        let mut fields = Map::new();
        fields.insert(
            "timestamp".to_string(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)),
        );
        fields.insert(
            "level".to_string(),
            Value::String(level.to_string().to_lowercase()),
        );
        fields.insert("message".to_string(), Value::String(message.to_string()));

        let span_context = cx.span().span_context().clone();
        if span_context.is_valid() {
            fields.insert(
                "trace_id".to_string(),
                Value::String(span_context.trace_id().to_string()),
            );
            fields.insert(
                "span_id".to_string(),
                Value::String(span_context.span_id().to_string()),
            );
        }

        baggage::mirror_to_fields(cx, &mut fields);

        let line = Value::Object(fields);
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{line}");
            let _ = writer.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::baggage::BaggageExt;
    use opentelemetry::trace::{SpanKind, Tracer, TracerProvider as _};
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::trace::SdkTracerProvider;
    use std::sync::Arc;

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl SharedBuffer {
        fn lines(&self) -> Vec<Value> {
            let buffer = self.0.lock().unwrap();
            String::from_utf8_lossy(&buffer)
                .lines()
                .map(|line| serde_json::from_str(line).unwrap())
                .collect()
        }
    }

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn buffered_logger(min_level: Level) -> (CorrelatedLogger, SharedBuffer) {
        let buffer = SharedBuffer::default();
        let logger = CorrelatedLogger::with_writer(Box::new(buffer.clone()), min_level);
        (logger, buffer)
    }

    #[test]
    fn entries_without_a_span_omit_trace_fields() {
        let (logger, buffer) = buffered_logger(Level::INFO);
        logger.info(&Context::new(), "plain entry");

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["message"], "plain entry");
        assert_eq!(lines[0]["level"], "info");
        assert!(lines[0].get("trace_id").is_none());
        assert!(lines[0].get("span_id").is_none());
        assert!(lines[0]["timestamp"].is_string());
    }

    #[test]
    fn active_span_adds_matching_trace_and_span_ids() {
        let provider = SdkTracerProvider::builder().build();
        let tracer = provider.tracer("test");
        let span = tracer.span_builder("op").with_kind(SpanKind::Internal).start(&tracer);
        let cx = Context::new().with_span(span);
        let span_context = cx.span().span_context().clone();

        let (logger, buffer) = buffered_logger(Level::INFO);
        logger.info(&cx, "traced entry");

        let lines = buffer.lines();
        assert_eq!(lines[0]["trace_id"], span_context.trace_id().to_string());
        assert_eq!(lines[0]["span_id"], span_context.span_id().to_string());
    }

    #[test]
    fn baggage_members_become_fields() {
        let cx = Context::new().with_baggage([KeyValue::new("bossname", "samir")]);
        let (logger, buffer) = buffered_logger(Level::INFO);
        logger.info(&cx, "with baggage");

        let lines = buffer.lines();
        assert_eq!(lines[0]["bossname"], "samir");
    }

    #[test]
    fn entries_below_minimum_level_are_dropped() {
        let (logger, buffer) = buffered_logger(Level::INFO);
        logger.log(Level::DEBUG, &Context::new(), "too verbose");
        logger.warn(&Context::new(), "kept");

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["message"], "kept");
        assert_eq!(lines[0]["level"], "warn");
    }
}
