use std::time::Duration;

use axum::http::StatusCode;
use once_cell::sync::Lazy;
use prometheus::{register_histogram_vec, register_int_counter_vec, Encoder, HistogramVec, IntCounterVec, TextEncoder};
use service::{Target, Verb};

// Prometheus metrics (default registry)
pub static STORE_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "catalog_rest_wmsstore_requests_total",
        "Requests handled by the wmsstores resource",
        &["method", "target", "status"]
    )
    .expect("register wmsstore_requests_total")
});

pub static STORE_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "catalog_rest_wmsstore_request_duration_seconds",
        "wmsstores request duration in seconds",
        &["method", "target"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("register wmsstore_request_duration")
});

fn target_label(target: &Target) -> &'static str {
    match target {
        Target::Collection { .. } => "collection",
        Target::Item(_) => "item",
    }
}

pub fn observe(verb: Verb, target: &Target, status: StatusCode, elapsed: Duration) {
    let kind = target_label(target);
    STORE_REQUESTS_TOTAL
        .with_label_values(&[verb.as_str(), kind, status.as_str()])
        .inc();
    STORE_REQUEST_DURATION
        .with_label_values(&[verb.as_str(), kind])
        .observe(elapsed.as_secs_f64());
}

pub fn encode_metrics() -> (StatusCode, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, format!("metrics encode error: {e}"));
    }
    (StatusCode::OK, String::from_utf8(buffer).unwrap_or_default())
}
