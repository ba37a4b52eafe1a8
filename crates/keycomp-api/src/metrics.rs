//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "keycomp_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "keycomp_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "keycomp_http_requests_in_flight";

    // Composition metrics
    pub const COMPOSITIONS_TOTAL: &str = "keycomp_compositions_total";
    pub const COMPOSE_BUSY_REJECTIONS_TOTAL: &str = "keycomp_compose_busy_rejections_total";
    pub const ENCODE_DURATION_SECONDS: &str = "keycomp_encode_duration_seconds";
    pub const COMPOSE_IN_FLIGHT: &str = "keycomp_compose_in_flight";

    // Acquisition metrics
    pub const ACQUISITION_DURATION_SECONDS: &str = "keycomp_acquisition_duration_seconds";
    pub const ACQUISITIONS_TOTAL: &str = "keycomp_acquisitions_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a finished composition attempt.
pub fn record_composition(strategy: &str, result: &str) {
    let labels = [
        ("strategy", strategy.to_string()),
        ("result", result.to_string()),
    ];
    counter!(names::COMPOSITIONS_TOTAL, &labels).increment(1);
}

/// Record a request rejected by the single-flight gate.
pub fn record_busy_rejection() {
    counter!(names::COMPOSE_BUSY_REJECTIONS_TOTAL).increment(1);
}

/// Record FFmpeg encode duration.
pub fn record_encode_duration(strategy: &str, duration_secs: f64) {
    let labels = [("strategy", strategy.to_string())];
    histogram!(names::ENCODE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Set whether a composition is running.
pub fn set_compose_in_flight(active: bool) {
    gauge!(names::COMPOSE_IN_FLIGHT).set(if active { 1.0 } else { 0.0 });
}

/// Record a source acquisition.
pub fn record_acquisition(acquirer: &str, success: bool, duration_secs: f64) {
    let labels = [
        ("acquirer", acquirer.to_string()),
        ("result", if success { "success" } else { "error" }.to_string()),
    ];
    counter!(names::ACQUISITIONS_TOTAL, &labels).increment(1);
    histogram!(names::ACQUISITION_DURATION_SECONDS, &labels).record(duration_secs);
}

static OUTPUT_NAME: LazyLock<regex_lite::Regex> = LazyLock::new(|| {
    regex_lite::Regex::new(r"/download/[^/]+").expect("valid regex")
});

/// Sanitize path for metrics labels (remove filenames).
fn sanitize_path(path: &str) -> String {
    OUTPUT_NAME
        .replace_all(path, "/download/:filename")
        .to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/download/final_550e8400-e29b-41d4-a716-446655440000.mp4"),
            "/api/download/:filename"
        );
        assert_eq!(sanitize_path("/api/compose"), "/api/compose");
    }
}
