//! Dispatch metrics tracking using OpenTelemetry.

use crate::notify::SessionOutcome;
use opentelemetry::KeyValue;
use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use std::time::Instant;

/// Metrics collector for change dispatch.
///
/// Tracks change events, per-subscriber session outcomes and latencies, and the
/// number of registered subscribers using OpenTelemetry metrics.
///
/// # Examples
///
/// ```rust,no_run
/// use configio::metrics::DispatchMetrics;
/// use opentelemetry::global;
///
/// let meter = global::meter("configio");
/// let metrics = DispatchMetrics::new(meter);
///
/// metrics.record_change_event(3);
/// ```
#[derive(Clone)]
pub struct DispatchMetrics {
    change_events: Counter<u64>,
    sessions: Counter<u64>,
    session_duration: Histogram<f64>,
    active_subscribers: Gauge<i64>,
}

impl DispatchMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let change_events = meter
            .u64_counter("configio.change_events")
            .with_description("Number of change events dispatched to subscribers")
            .build();

        let sessions = meter
            .u64_counter("configio.sessions")
            .with_description("Finished notification sessions by outcome")
            .build();

        let session_duration = meter
            .f64_histogram("configio.session.duration")
            .with_description("Time from callback invocation to session resolution in seconds")
            .with_unit("s")
            .build();

        let active_subscribers = meter
            .i64_gauge("configio.subscribers.active")
            .with_description("Number of registered subscribers at the last change event")
            .build();

        Self {
            change_events,
            sessions,
            session_duration,
            active_subscribers,
        }
    }

    /// Record a change event fanned out to `subscribers` sessions.
    pub fn record_change_event(&self, subscribers: usize) {
        self.change_events.add(1, &[]);
        self.active_subscribers.record(subscribers as i64, &[]);
    }

    /// Record a finished session.
    ///
    /// # Arguments
    ///
    /// * `outcome` - How the session resolved
    /// * `start` - When the session started running
    pub fn record_session(&self, outcome: &SessionOutcome, start: Instant) {
        let attrs = [KeyValue::new("outcome", outcome.as_str())];
        self.sessions.add(1, &attrs);
        self.session_duration
            .record(start.elapsed().as_secs_f64(), &attrs);
    }
}
