/// Metrics for the blob storage service
///
/// Prometheus-compatible counters for blob operations, stored bytes and
/// HTTP traffic, rendered in text format on `/metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, Encoder,
    HistogramVec, IntCounter, IntCounterVec, TextEncoder,
};

lazy_static! {
    // ========== Blob Metrics ==========

    /// Service operations by operation name and outcome
    pub static ref BLOB_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "blob_operations_total",
        "Total number of blob storage operations",
        &["operation", "status"]
    )
    .unwrap();

    /// Plaintext bytes accepted by create
    pub static ref BLOB_BYTES_STORED_TOTAL: IntCounter = register_int_counter!(
        "blob_bytes_stored_total",
        "Total plaintext bytes stored through the service"
    )
    .unwrap();

    /// Connector calls by namespace and method
    pub static ref BLOB_CONNECTOR_CALLS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "blob_connector_calls_total",
        "Total number of blob connector calls",
        &["namespace", "method"]
    )
    .unwrap();

    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Record the outcome of a service operation
pub fn record_blob_operation(operation: &str, success: bool) {
    let status = if success { "success" } else { "error" };
    BLOB_OPERATIONS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
}

/// Record plaintext bytes accepted by create
pub fn record_bytes_stored(bytes: u64) {
    BLOB_BYTES_STORED_TOTAL.inc_by(bytes);
}

/// Record a call into a connector
pub fn record_connector_call(namespace: &str, method: &str) {
    BLOB_CONNECTOR_CALLS_TOTAL
        .with_label_values(&[namespace, method])
        .inc();
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}
