//! Change notification metrics using OpenTelemetry.

use opentelemetry::metrics::{Counter, Gauge, Histogram, Meter};
use std::sync::Arc;
use std::time::Instant;

/// Metrics collector for the change notification pipeline.
///
/// # Examples
///
/// ```rust,no_run
/// use redis_config_store::metrics::NotificationMetrics;
/// use opentelemetry::global;
///
/// let metrics = NotificationMetrics::new(global::meter("redis-config-store"));
///
/// let timer = metrics.start_refresh();
/// // ... refresh the subscriber ...
/// metrics.record_refresh_success(timer);
/// ```
#[derive(Clone)]
pub struct NotificationMetrics {
    publishes: Counter<u64>,
    messages_received: Counter<u64>,
    self_suppressed: Counter<u64>,
    refreshes: Counter<u64>,
    refresh_failures: Counter<u64>,
    refresh_duration: Histogram<f64>,
    refresh_age_seconds: Gauge<i64>,
    last_refresh: Arc<parking_lot::Mutex<Instant>>,
}

impl NotificationMetrics {
    /// Create a new metrics collector with the provided meter.
    pub fn new(meter: Meter) -> Self {
        let publishes = meter
            .u64_counter("redis_config_store.publish.count")
            .with_description("Number of change announcements sent")
            .build();

        let messages_received = meter
            .u64_counter("redis_config_store.messages.received")
            .with_description("Number of change announcements received")
            .build();

        let self_suppressed = meter
            .u64_counter("redis_config_store.messages.self_suppressed")
            .with_description("Received announcements ignored because this instance sent them")
            .build();

        let refreshes = meter
            .u64_counter("redis_config_store.refresh.count")
            .with_description("Number of subscriber refreshes triggered")
            .build();

        let refresh_failures = meter
            .u64_counter("redis_config_store.refresh.failures")
            .with_description("Number of subscriber refreshes that failed")
            .build();

        let refresh_duration = meter
            .f64_histogram("redis_config_store.refresh.duration")
            .with_description("Duration of subscriber refreshes in seconds")
            .with_unit("s")
            .build();

        let refresh_age_seconds = meter
            .i64_gauge("redis_config_store.refresh.age")
            .with_description("Time since the last successful refresh in seconds")
            .with_unit("s")
            .build();

        Self {
            publishes,
            messages_received,
            self_suppressed,
            refreshes,
            refresh_failures,
            refresh_duration,
            refresh_age_seconds,
            last_refresh: Arc::new(parking_lot::Mutex::new(Instant::now())),
        }
    }

    /// Record a change announcement sent by this instance.
    pub fn record_publish(&self) {
        self.publishes.add(1, &[]);
    }

    /// Record an announcement received on the channel.
    pub fn record_message(&self) {
        self.messages_received.add(1, &[]);
    }

    /// Record an announcement dropped because it carried this instance's identity.
    pub fn record_suppressed(&self) {
        self.self_suppressed.add(1, &[]);
    }

    /// Start timing a subscriber refresh.
    pub fn start_refresh(&self) -> Instant {
        self.refreshes.add(1, &[]);
        Instant::now()
    }

    /// Record a refresh that completed successfully.
    pub fn record_refresh_success(&self, start: Instant) {
        self.refresh_duration.record(start.elapsed().as_secs_f64(), &[]);
        *self.last_refresh.lock() = Instant::now();
    }

    /// Record a refresh that returned an error or panicked.
    pub fn record_refresh_failure(&self, start: Instant) {
        self.refresh_failures.add(1, &[]);
        self.refresh_duration.record(start.elapsed().as_secs_f64(), &[]);
    }

    /// Update the age gauge. Call periodically to track staleness.
    pub fn update_refresh_age(&self) {
        let age_secs = self.last_refresh.lock().elapsed().as_secs() as i64;
        self.refresh_age_seconds.record(age_secs, &[]);
    }
}
