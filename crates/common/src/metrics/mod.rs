//! Metrics and observability utilities
//!
//! Prometheus metrics with standardized naming for the directory services.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all Linkdir metrics
pub const METRICS_PREFIX: &str = "linkdir";

/// Request latency buckets (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001,  // 1ms
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
];

/// Buckets for badge checks (remote page fetches, bounded by the fetch timeout)
pub const BADGE_CHECK_BUCKETS: &[f64] = &[
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.000,  // 2s
    4.000,  // 4s
    8.000,  // 8s
    15.00,  // 15s
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

    // Badge metrics
    describe_counter!(
        format!("{}_badge_checks_total", METRICS_PREFIX),
        Unit::Count,
        "Total badge checks by outcome"
    );

    describe_histogram!(
        format!("{}_badge_check_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Badge check latency in seconds"
    );

    // Submission metrics
    describe_counter!(
        format!("{}_submissions_total", METRICS_PREFIX),
        Unit::Count,
        "Submissions created by initial status"
    );

    describe_counter!(
        format!("{}_submissions_published_total", METRICS_PREFIX),
        Unit::Count,
        "Submissions promoted to published"
    );

    // Redirect metrics
    describe_counter!(
        format!("{}_redirects_total", METRICS_PREFIX),
        Unit::Count,
        "Outbound redirects by result"
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

/// Helper to record badge check metrics
pub fn record_badge_check(duration_secs: f64, outcome: &str) {
    counter!(
        format!("{}_badge_checks_total", METRICS_PREFIX),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(format!("{}_badge_check_duration_seconds", METRICS_PREFIX))
        .record(duration_secs);
}

/// Helper to record a created submission
pub fn record_submission(status: &str, trusted: bool) {
    counter!(
        format!("{}_submissions_total", METRICS_PREFIX),
        "status" => status.to_string(),
        "path" => if trusted { "trusted" } else { "verified" }.to_string()
    )
    .increment(1);
}

/// Helper to record a publisher pass
pub fn record_published(count: u64) {
    counter!(format!("{}_submissions_published_total", METRICS_PREFIX)).increment(count);
}

/// Helper to record redirect outcomes
pub fn record_redirect(result: &str) {
    counter!(
        format!("{}_redirects_total", METRICS_PREFIX),
        "result" => result.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buckets_sorted() {
        for buckets in [LATENCY_BUCKETS, BADGE_CHECK_BUCKETS] {
            let mut prev = 0.0;
            for &bucket in buckets {
                assert!(bucket > prev);
                prev = bucket;
            }
        }
    }

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("GET", "/go/{encoded}");
        std::thread::sleep(std::time::Duration::from_millis(5));
        metrics.finish(301);
        // Just verify it runs without panic
    }
}
