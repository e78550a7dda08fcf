//! Metrics and observability utilities
//!
//! Provides Prometheus metrics with SLO-aligned histograms
//! and standardized naming conventions.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

use crate::errors::{AppError, ErrorCode};

/// Metrics prefix for all PaperShelf metrics
pub const METRICS_PREFIX: &str = "papershelf";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 10ms, P99 < 100ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms - P50 target
    0.025, // 25ms
    0.050, // 50ms
    0.100, // 100ms - P99 target
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
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

    // Store metrics
    describe_counter!(
        format!("{}_store_operations_total", METRICS_PREFIX),
        Unit::Count,
        "Total record store operations by outcome"
    );

    describe_counter!(
        format!("{}_store_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Record store operations that failed in the backend"
    );

    describe_histogram!(
        format!("{}_store_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Record store operation latency in seconds"
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

/// Times one record store operation
pub struct StoreTimer {
    start: Instant,
    operation: &'static str,
}

impl StoreTimer {
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }

    /// Record the outcome and hand the result back untouched
    pub fn observe<T>(self, result: Result<T, AppError>) -> Result<T, AppError> {
        let outcome = match &result {
            Ok(_) => "ok",
            Err(err) => store_outcome(err.code()),
        };

        counter!(
            format!("{}_store_operations_total", METRICS_PREFIX),
            "operation" => self.operation,
            "outcome" => outcome
        )
        .increment(1);

        if matches!(outcome, "constraint_violation" | "unavailable") {
            counter!(
                format!("{}_store_errors_total", METRICS_PREFIX),
                "operation" => self.operation
            )
            .increment(1);
        }

        histogram!(
            format!("{}_store_duration_seconds", METRICS_PREFIX),
            "operation" => self.operation
        )
        .record(self.start.elapsed().as_secs_f64());

        result
    }
}

fn store_outcome(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::NotFound => "not_found",
        ErrorCode::ConstraintViolation => "constraint_violation",
        ErrorCode::StoreUnavailable => "unavailable",
        _ => "rejected",
    }
}
