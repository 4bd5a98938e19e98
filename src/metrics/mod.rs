//! Prometheus metrics for enrichment runs.
//!
//! Counters live in the default Prometheus registry. A run can dump them with
//! [`gather_metrics`] for a node-exporter textfile collector.
//!
//! # Example
//! ```no_run
//! use github_enricher::metrics::ENRICHER_METRICS;
//!
//! ENRICHER_METRICS
//!     .cache_lookups
//!     .with_label_values(&["email", "hit"])
//!     .inc();
//! ```

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

/// Enrichment metrics
pub struct EnricherMetrics {
    /// Data rows written
    pub rows_processed: IntCounter,

    /// Per-field enrichment failures
    pub field_failures: IntCounterVec,

    /// Cache lookups by outcome (hit, miss, error)
    pub cache_lookups: IntCounterVec,

    /// Cache writes that failed after a successful compute
    pub cache_write_failures: IntCounterVec,

    /// Collaborator calls by source and outcome
    pub collaborator_calls: IntCounterVec,

    /// Time spent computing a field on cache miss
    pub compute_duration: HistogramVec,
}

lazy_static! {
    pub static ref ENRICHER_METRICS: EnricherMetrics = EnricherMetrics {
        rows_processed: register_int_counter!(
            "github_enricher_rows_processed_total",
            "Total number of data rows written"
        )
        .expect("Failed to create rows_processed metric"),

        field_failures: register_int_counter_vec!(
            "github_enricher_field_failures_total",
            "Total number of fields rendered empty because enrichment failed",
            &["field", "error"]
        )
        .expect("Failed to create field_failures metric"),

        cache_lookups: register_int_counter_vec!(
            "github_enricher_cache_lookups_total",
            "Total number of cache lookups by outcome",
            &["field", "result"]
        )
        .expect("Failed to create cache_lookups metric"),

        cache_write_failures: register_int_counter_vec!(
            "github_enricher_cache_write_failures_total",
            "Total number of cache writes that failed",
            &["field"]
        )
        .expect("Failed to create cache_write_failures metric"),

        collaborator_calls: register_int_counter_vec!(
            "github_enricher_collaborator_calls_total",
            "Total number of external collaborator calls",
            &["source", "outcome"]
        )
        .expect("Failed to create collaborator_calls metric"),

        compute_duration: register_histogram_vec!(
            "github_enricher_compute_duration_seconds",
            "Time spent computing a field on cache miss",
            &["field"],
            vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
        )
        .expect("Failed to create compute_duration metric"),
    };
}

/// Force registration so every series shows up in the first scrape
pub fn init_metrics() {
    lazy_static::initialize(&ENRICHER_METRICS);
}

/// Record the outcome of a collaborator call
pub fn record_collaborator_call<T, E>(source: &str, result: &Result<T, E>) {
    let outcome = if result.is_ok() { "success" } else { "failure" };
    ENRICHER_METRICS
        .collaborator_calls
        .with_label_values(&[source, outcome])
        .inc();
}

/// Render all registered metrics in the Prometheus text format
pub fn gather_metrics() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::from("# Error encoding metrics\n");
    }

    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Failed to convert metrics to string: {}", e);
        String::from("# Error converting metrics\n")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_includes_enricher_series() {
        init_metrics();
        ENRICHER_METRICS
            .cache_lookups
            .with_label_values(&["metrics_test_field", "hit"])
            .inc();

        let output = gather_metrics();
        assert!(output.contains("github_enricher_cache_lookups_total"));
        assert!(output.contains("metrics_test_field"));
    }

    #[test]
    fn test_record_collaborator_call() {
        let before = ENRICHER_METRICS
            .collaborator_calls
            .with_label_values(&["metrics_test_source", "failure"])
            .get();

        let result: Result<(), &str> = Err("boom");
        record_collaborator_call("metrics_test_source", &result);

        let after = ENRICHER_METRICS
            .collaborator_calls
            .with_label_values(&["metrics_test_source", "failure"])
            .get();
        assert_eq!(after, before + 1);
    }
}
