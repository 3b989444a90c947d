//! The authorization check, doubling as the fault-injection surface.
//!
//! Request query parameters drive two synthetic faults: `error=remote401`
//! simulates an authorization denial (recorded on the span as a real
//! error would be) and `error=remoteLatency` injects a bounded random
//! delay. Both exist so the trace/log/metric correlation pipeline can be
//! exercised end to end.

use std::ops::RangeInclusive;
use std::sync::Mutex;
use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry::trace::{SpanKind, Status};
use opentelemetry::Context;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::state::AppState;
use crate::telemetry::start_span;

/// Injected latency is a whole number of seconds drawn from this
/// inclusive range.
pub const LATENCY_RANGE_SECS: RangeInclusive<u64> = 2..=6;

const ERROR_PARAM: &str = "error";
const REMOTE_401: &str = "remote401";
const REMOTE_LATENCY: &str = "remoteLatency";

#[derive(Debug, Error)]
#[error("unknown user")]
struct UnknownUser;

/// Source of the injected delay. Kept as a trait so tests can pin the
/// picked value instead of depending on wall-clock sleeps.
pub trait DelayPicker: Send + Sync {
    fn delay_secs(&self) -> u64;
}

/// Uniform pick from [`LATENCY_RANGE_SECS`], optionally seeded.
pub struct RandomDelay {
    rng: Mutex<StdRng>,
}

impl RandomDelay {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomDelay {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayPicker for RandomDelay {
    fn delay_secs(&self) -> u64 {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_range(LATENCY_RANGE_SECS),
            // A poisoned rng still has to produce an in-range delay.
            Err(poisoned) => poisoned.into_inner().gen_range(LATENCY_RANGE_SECS),
        }
    }
}

/// Checks whether the request is authorized.
///
/// Opens a child span for the check, logs a correlated "checking auth"
/// entry against the request context, and increments the auth counter
/// exactly once regardless of the outcome. Every value of every query
/// parameter is inspected: the first `error=remote401` wins and fails
/// the check; each `error=remoteLatency` sleeps the current task for the
/// picked delay, records it as the `addedLatency` span attribute, and
/// the scan continues. Anything else is ignored.
pub async fn check_auth(state: &AppState, cx: &Context, raw_query: Option<&str>) -> bool {
    let scope = start_span(&state.tracer, cx, "checkAuth", SpanKind::Internal);

    // The log entry carries the request context, so it correlates with
    // the server span rather than the check's own child span.
    state.logger.info(cx, "Checking auth...");

    state.auth_attempts.add(1, &[]);

    let raw_query = raw_query.unwrap_or_default();
    for (key, value) in url::form_urlencoded::parse(raw_query.as_bytes()) {
        if key != ERROR_PARAM {
            continue;
        }
        match value.as_ref() {
            REMOTE_401 => {
                scope.span().set_status(Status::error("unknown user"));
                scope.span().record_error(&UnknownUser);
                return false;
            }
            REMOTE_LATENCY => {
                scope.span().add_event("Adding latency", vec![]);
                let secs = state.delay.delay_secs();
                tokio::time::sleep(Duration::from_secs(secs)).await;
                scope
                    .span()
                    .set_attribute(KeyValue::new("addedLatency", secs as i64));
            }
            _ => {}
        }
    }

    true
}
