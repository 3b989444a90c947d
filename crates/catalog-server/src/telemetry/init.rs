//! Provider and resource initialization.
//!
//! The resource descriptor is built exactly once behind a `OnceLock` and
//! shared by the tracer and meter providers; after first construction it
//! is read-only. Exporter construction failures are startup-fatal.

use std::sync::{Arc, OnceLock};

use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::metrics::{Counter, MeterProvider as _};
use opentelemetry::propagation::TextMapCompositePropagator;
use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::metrics::{PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::propagation::{BaggagePropagator, TraceContextPropagator};
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_semantic_conventions::resource::{
    HOST_NAME, OS_TYPE, PROCESS_PID, SERVICE_VERSION,
};

static RESOURCE: OnceLock<Resource> = OnceLock::new();

/// Static attributes describing the running process and host, merged with
/// the SDK's default service attributes. Built once, then shared by every
/// span and metric emitted afterward.
pub fn resource(service_name: &str) -> Resource {
    RESOURCE
        .get_or_init(|| {
            let host = hostname::get()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "unknown".to_string());

            Resource::builder()
                .with_service_name(service_name.to_string())
                .with_attribute(KeyValue::new(SERVICE_VERSION, env!("CARGO_PKG_VERSION")))
                .with_attributes([
                    KeyValue::new(HOST_NAME, host),
                    KeyValue::new(OS_TYPE, std::env::consts::OS),
                    KeyValue::new(PROCESS_PID, std::process::id() as i64),
                ])
                .build()
        })
        .clone()
}

/// Installs the composite W3C TraceContext + Baggage propagator. Inbound
/// requests carry both encodings; extraction attaches them to the
/// per-request context.
pub fn init_propagator() {
    let propagator = TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]);
    global::set_text_map_propagator(propagator);
}

/// Guard that ensures proper shutdown of OpenTelemetry providers. Call
/// [`TelemetryGuard::shutdown`] at process exit to flush both providers;
/// a flush failure there is a fatal shutdown error. Dropping the guard
/// without the explicit call still attempts a best-effort shutdown.
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl TelemetryGuard {
    pub fn shutdown(mut self) -> anyhow::Result<()> {
        if let Some(provider) = self.tracer_provider.take() {
            provider.shutdown()?;
        }
        if let Some(provider) = self.meter_provider.take() {
            provider.shutdown()?;
        }
        Ok(())
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("failed to shutdown tracer provider: {e:?}");
        }
        if let Some(provider) = self.meter_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("failed to shutdown meter provider: {e:?}");
        }
    }
}

/// Handles produced by [`init_telemetry`] and passed into the request
/// path explicitly; nothing downstream reaches for module globals.
pub struct Telemetry {
    pub guard: TelemetryGuard,
    pub tracer: Arc<BoxedTracer>,
    pub auth_attempts: Counter<u64>,
}

/// Initializes tracing and metrics with OTLP gRPC exporters: batched
/// span export and a periodic metric reader, both owning a background
/// schedule so handlers never wait on export completion.
pub fn init_telemetry(service_name: &str) -> anyhow::Result<Telemetry> {
    init_propagator();

    let resource = resource(service_name);

    let span_exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()?;
    let tracer_provider = SdkTracerProvider::builder()
        .with_resource(resource.clone())
        .with_batch_exporter(span_exporter)
        .build();
    global::set_tracer_provider(tracer_provider.clone());

    let metric_exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .build()?;
    let reader = PeriodicReader::builder(metric_exporter).build();
    let meter_provider = SdkMeterProvider::builder()
        .with_resource(resource)
        .with_reader(reader)
        .build();
    global::set_meter_provider(meter_provider.clone());

    let tracer = Arc::new(global::tracer("catalog"));

    let auth_attempts = meter_provider
        .meter("catalog")
        .u64_counter("auth.cnt")
        .with_description("The number of auth attempts")
        .with_unit("{auth}")
        .build();

    Ok(Telemetry {
        guard: TelemetryGuard {
            tracer_provider: Some(tracer_provider),
            meter_provider: Some(meter_provider),
        },
        tracer,
        auth_attempts,
    })
}
