//! Prometheus metrics for contract-service.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

/// Histogram for database query duration by operation.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "contract_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    )
    .expect("Failed to register DB_QUERY_DURATION")
});

/// Counter for schedule computations by anchor.
pub static SCHEDULE_COMPUTATIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "contract_schedule_computations_total",
        "Total number of billing and recognition schedule computations",
        &["anchor"]
    )
    .expect("Failed to register SCHEDULE_COMPUTATIONS")
});

/// Counter for pattern detection runs.
pub static PATTERN_DETECTIONS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "contract_pattern_detections_total",
        "Total number of recurring pattern detection runs",
        &["status"]
    )
    .expect("Failed to register PATTERN_DETECTIONS")
});

/// Counter for payment match proposals and confirmations.
pub static PAYMENT_MATCHES: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "contract_payment_matches_total",
        "Total number of payment matches",
        &["match_type", "stage"]
    )
    .expect("Failed to register PAYMENT_MATCHES")
});

/// Counter for invoices generated from billing schedules.
pub static INVOICES_GENERATED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "contract_invoices_generated_total",
        "Total number of invoices generated",
        &["outcome"]
    )
    .expect("Failed to register INVOICES_GENERATED")
});

/// Counter for errors.
pub static ERRORS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "contract_errors_total",
        "Total number of errors",
        &["error_type"]
    )
    .expect("Failed to register ERRORS")
});

/// Initialize all metrics (forces lazy initialization).
pub fn init_metrics() {
    Lazy::force(&DB_QUERY_DURATION);
    Lazy::force(&SCHEDULE_COMPUTATIONS);
    Lazy::force(&PATTERN_DETECTIONS);
    Lazy::force(&PAYMENT_MATCHES);
    Lazy::force(&INVOICES_GENERATED);
    Lazy::force(&ERRORS);
}

/// Get all metrics as Prometheus text format.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8(buffer).unwrap_or_default()
}

pub fn record_schedule_computation(anchor: &str) {
    SCHEDULE_COMPUTATIONS.with_label_values(&[anchor]).inc();
}

pub fn record_pattern_detection(status: &str) {
    PATTERN_DETECTIONS.with_label_values(&[status]).inc();
}

pub fn record_payment_match(match_type: &str, stage: &str) {
    PAYMENT_MATCHES.with_label_values(&[match_type, stage]).inc();
}

pub fn record_invoice_generated(outcome: &str) {
    INVOICES_GENERATED.with_label_values(&[outcome]).inc();
}

/// Record an error.
pub fn record_error(error_type: &str) {
    ERRORS.with_label_values(&[error_type]).inc();
}
