//! Point anomaly classification
//!
//! Decides whether a sample deviates significantly from its stream's window
//! statistics, grades the deviation, and labels it per metric family.

use chrono::{DateTime, Utc};

use super::event::{AnomalyEvent, AnomalyType, Severity};
use super::stats::StatsSnapshot;

/// Minimum samples required before any verdict is given
pub const MIN_SAMPLES_FOR_DETECTION: usize = 10;

/// Deviations must strictly exceed this many standard deviations
pub const ANOMALY_THRESHOLD_SIGMA: f64 = 2.0;

/// Below this stddev the stream is treated as constant
const NEAR_CONSTANT_STDDEV: f64 = 0.001;

/// Relative change from the mean that flags a near-constant stream
const NEAR_CONSTANT_RELATIVE_CHANGE: f64 = 0.5;

/// Sigma reported for near-constant streams (not a computed z-score)
pub const NEAR_CONSTANT_SIGMA: f64 = 10.0;

/// Test `value` against the window statistics
///
/// # Returns
/// * `Some(sigma)` if the value is anomalous
/// * `None` if it is within range or there is not enough history
pub fn is_anomalous(stats: &StatsSnapshot, value: f64) -> Option<f64> {
    if stats.count < MIN_SAMPLES_FOR_DETECTION {
        return None;
    }

    let deviation = (value - stats.mean).abs();

    // Nearly constant values - fall back to a relative change test
    if stats.stddev < NEAR_CONSTANT_STDDEV {
        return (deviation > stats.mean * NEAR_CONSTANT_RELATIVE_CHANGE)
            .then_some(NEAR_CONSTANT_SIGMA);
    }

    let sigma = deviation / stats.stddev;
    (sigma > ANOMALY_THRESHOLD_SIGMA).then_some(sigma)
}

/// Grade a point anomaly by its sigma deviation
pub fn severity_for_sigma(sigma: f64) -> Severity {
    if sigma > 4.0 {
        Severity::Critical
    } else if sigma > 3.0 {
        Severity::High
    } else if sigma > 2.5 {
        Severity::Medium
    } else {
        Severity::Low
    }
}

/// Metric streams that produce point anomalies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricFamily {
    Cpu,
    Memory,
    IoWrite,
}

impl MetricFamily {
    /// Event type for a deviation in the given direction
    pub fn anomaly_type(&self, value: f64, mean: f64) -> AnomalyType {
        let above = value > mean;
        match self {
            MetricFamily::Cpu if above => AnomalyType::CpuSpike,
            MetricFamily::Cpu => AnomalyType::CpuDrop,
            MetricFamily::Memory => AnomalyType::MemorySpike,
            MetricFamily::IoWrite if above => AnomalyType::IoSpike,
            MetricFamily::IoWrite => AnomalyType::IoStall,
        }
    }

    /// Human-readable summary embedding value, mean and deviation with units
    pub fn describe(&self, value: f64, mean: f64, sigma: f64) -> String {
        let above = value > mean;
        match self {
            MetricFamily::Cpu => format!(
                "CPU {} detected: {:.2}% (expected {:.2}%, {:.1}σ deviation)",
                if above { "spike" } else { "drop" },
                value,
                mean,
                sigma
            ),
            MetricFamily::Memory => format!(
                "Memory {} detected: {:.0} KB (expected {:.0} KB, {:.1}σ deviation)",
                if above { "spike" } else { "drop" },
                value,
                mean,
                sigma
            ),
            MetricFamily::IoWrite => format!(
                "I/O write {} detected: {:.2} KB/s (expected {:.2} KB/s, {:.1}σ deviation)",
                if above { "spike" } else { "stall" },
                value,
                mean,
                sigma
            ),
        }
    }

    /// Classify `value` into a complete event, if anomalous
    pub fn classify(
        &self,
        stats: &StatsSnapshot,
        value: f64,
        detected_at: DateTime<Utc>,
    ) -> Option<AnomalyEvent> {
        let sigma = is_anomalous(stats, value)?;

        Some(AnomalyEvent {
            anomaly_type: self.anomaly_type(value, stats.mean),
            severity: severity_for_sigma(sigma),
            value,
            expected_mean: stats.mean,
            deviation_sigma: sigma,
            detected_at,
            description: self.describe(value, stats.mean, sigma),
        })
    }
}
