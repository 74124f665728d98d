//! Streaming anomaly detection for process resource usage
//!
//! This module provides:
//! - Bounded per-metric statistics over a fixed-size sample ring
//! - Point anomaly classification (z-score with a near-constant fallback)
//! - Memory leak detection (sustained monotonic growth)
//! - A per-process detector that assembles events into a bounded batch

mod classifier;
mod detector;
mod event;
mod leak_detector;
mod ring;
mod stats;

pub use classifier::{
    is_anomalous, severity_for_sigma, MetricFamily, ANOMALY_THRESHOLD_SIGMA,
    MIN_SAMPLES_FOR_DETECTION, NEAR_CONSTANT_SIGMA,
};
pub use detector::{AnomalyDetector, DetectorSnapshot, DetectorState};
pub use event::{AnomalyEvent, AnomalyType, EventBatch, Severity};
pub use leak_detector::{LeakAnomaly, LeakDetector};
pub use ring::{SampleRing, SAMPLE_CAPACITY};
pub use stats::{MetricStats, StatsSnapshot};
