//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all CampusDesk metrics
pub const METRICS_PREFIX: &str = "campusdesk";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 250ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms - P50 target
    0.100,  // 100ms
    0.250,  // 250ms - P99 target
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Accounting metrics
    describe_counter!(
        format!("{}_journal_entries_posted_total", METRICS_PREFIX),
        Unit::Count,
        "Journal entries moved from draft to posted"
    );

    describe_counter!(
        format!("{}_journal_entries_reversed_total", METRICS_PREFIX),
        Unit::Count,
        "Journal entries reversed"
    );

    // Kaizen metrics
    describe_counter!(
        format!("{}_kaizen_votes_total", METRICS_PREFIX),
        Unit::Count,
        "Kaizen votes cast or changed"
    );

    // Workflow metrics
    describe_counter!(
        format!("{}_status_transitions_total", METRICS_PREFIX),
        Unit::Count,
        "Accepted status transitions"
    );

    describe_counter!(
        format!("{}_transition_rejections_total", METRICS_PREFIX),
        Unit::Count,
        "Status transitions rejected by a lifecycle table"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

pub fn record_journal_posted() {
    counter!(format!("{}_journal_entries_posted_total", METRICS_PREFIX)).increment(1);
}

pub fn record_journal_reversed() {
    counter!(format!("{}_journal_entries_reversed_total", METRICS_PREFIX)).increment(1);
}

pub fn record_vote(direction: &'static str) {
    counter!(
        format!("{}_kaizen_votes_total", METRICS_PREFIX),
        "direction" => direction
    )
    .increment(1);
}

pub fn record_transition(entity: &'static str, to: String) {
    counter!(
        format!("{}_status_transitions_total", METRICS_PREFIX),
        "entity" => entity,
        "to" => to
    )
    .increment(1);
}

pub fn record_transition_rejected(entity: &'static str) {
    counter!(
        format!("{}_transition_rejections_total", METRICS_PREFIX),
        "entity" => entity
    )
    .increment(1);
}
