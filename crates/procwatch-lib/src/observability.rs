//! Observability infrastructure for procwatch
//!
//! Provides:
//! - Prometheus metrics (samples, anomalies by type/severity, check latency)
//! - Structured logging of anomaly and lifecycle events with tracing

use crate::anomaly::{AnomalyEvent, Severity};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for detector checks (in seconds)
const CHECK_LATENCY_BUCKETS: &[f64] = &[
    0.000_001, 0.000_005, 0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<DetectorMetricsInner> = OnceLock::new();

struct DetectorMetricsInner {
    samples_ingested: IntCounter,
    sample_errors: IntCounter,
    anomalies_detected: IntCounterVec,
    anomalies_dropped: IntCounter,
    check_latency_seconds: Histogram,
    processes_monitored: IntGauge,
    export_errors: IntCounter,
}

impl DetectorMetricsInner {
    fn new() -> Self {
        Self {
            samples_ingested: register_int_counter!(
                "procwatch_samples_ingested_total",
                "Process samples fed into anomaly detectors"
            )
            .expect("Failed to register samples_ingested"),

            sample_errors: register_int_counter!(
                "procwatch_sample_errors_total",
                "Failed attempts to read process metrics"
            )
            .expect("Failed to register sample_errors"),

            anomalies_detected: register_int_counter_vec!(
                "procwatch_anomalies_detected_total",
                "Anomaly events emitted, by type and severity",
                &["type", "severity"]
            )
            .expect("Failed to register anomalies_detected"),

            anomalies_dropped: register_int_counter!(
                "procwatch_anomalies_dropped_total",
                "Anomaly events discarded because a tick hit its event cap"
            )
            .expect("Failed to register anomalies_dropped"),

            check_latency_seconds: register_histogram!(
                "procwatch_check_latency_seconds",
                "Time spent updating and checking a detector for one tick",
                CHECK_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register check_latency_seconds"),

            processes_monitored: register_int_gauge!(
                "procwatch_processes_monitored",
                "Number of processes currently being monitored"
            )
            .expect("Failed to register processes_monitored"),

            export_errors: register_int_counter!(
                "procwatch_export_errors_total",
                "Failed anomaly exports"
            )
            .expect("Failed to register export_errors"),
        }
    }
}

/// Detector metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct DetectorMetrics {
    _private: (),
}

impl Default for DetectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DetectorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &DetectorMetricsInner {
        GLOBAL_METRICS.get_or_init(DetectorMetricsInner::new)
    }

    pub fn inc_samples_ingested(&self) {
        self.inner().samples_ingested.inc();
    }

    pub fn inc_sample_errors(&self) {
        self.inner().sample_errors.inc();
    }

    /// Count an emitted anomaly under its type and severity
    pub fn record_anomaly(&self, event: &AnomalyEvent) {
        self.inner()
            .anomalies_detected
            .with_label_values(&[event.anomaly_type.as_str(), event.severity.as_str()])
            .inc();
    }

    pub fn add_anomalies_dropped(&self, count: usize) {
        self.inner().anomalies_dropped.inc_by(count as u64);
    }

    pub fn observe_check_latency(&self, duration_secs: f64) {
        self.inner().check_latency_seconds.observe(duration_secs);
    }

    pub fn set_processes_monitored(&self, count: i64) {
        self.inner().processes_monitored.set(count);
    }

    pub fn inc_export_errors(&self) {
        self.inner().export_errors.inc();
    }
}

/// Structured logger for detector events
///
/// Keeps the field names of anomaly, sampling and lifecycle records
/// consistent across the agent.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    /// Log an anomaly; critical ones at warn level
    pub fn log_anomaly(&self, pid: u32, event: &AnomalyEvent) {
        if event.severity == Severity::Critical {
            warn!(
                event = "anomaly_detected",
                instance = %self.instance,
                pid = pid,
                anomaly_type = %event.anomaly_type,
                severity = %event.severity,
                value = event.value,
                expected = event.expected_mean,
                deviation_sigma = event.deviation_sigma,
                description = %event.description,
                "Critical anomaly detected"
            );
        } else {
            info!(
                event = "anomaly_detected",
                instance = %self.instance,
                pid = pid,
                anomaly_type = %event.anomaly_type,
                severity = %event.severity,
                value = event.value,
                expected = event.expected_mean,
                deviation_sigma = event.deviation_sigma,
                description = %event.description,
                "Anomaly detected"
            );
        }
    }

    /// Log events lost to the per-tick cap
    pub fn log_truncated(&self, pid: u32, kept: usize, dropped: usize) {
        warn!(
            event = "anomalies_truncated",
            instance = %self.instance,
            pid = pid,
            kept = kept,
            dropped = dropped,
            "More anomalies than the per-tick cap, extra events dropped"
        );
    }

    /// Log a failed process reading
    pub fn log_sample_error(&self, pid: u32, error: &dyn std::error::Error) {
        warn!(
            event = "sample_failed",
            instance = %self.instance,
            pid = pid,
            error = %error,
            "Failed to sample process"
        );
    }

    /// Log a failed anomaly export
    pub fn log_export_error(&self, pid: u32, error: &dyn std::error::Error) {
        warn!(
            event = "export_failed",
            instance = %self.instance,
            pid = pid,
            error = %error,
            "Failed to export anomalies"
        );
    }

    /// Log monitoring start for a process
    pub fn log_monitoring_started(&self, pid: u32, interval_secs: f64) {
        info!(
            event = "monitoring_started",
            instance = %self.instance,
            pid = pid,
            interval_secs = interval_secs,
            "Started monitoring process"
        );
    }

    /// Log agent startup
    pub fn log_startup(&self, version: &str, pids: &[u32]) {
        info!(
            event = "agent_started",
            instance = %self.instance,
            agent_version = %version,
            pids = ?pids,
            "procwatch started"
        );
    }

    /// Log agent shutdown
    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            instance = %self.instance,
            reason = %reason,
            "procwatch shutting down"
        );
    }
}
