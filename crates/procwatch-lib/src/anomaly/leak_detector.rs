//! Memory leak detection
//!
//! Detects leaks as a sustained run of increases across the buffered memory
//! samples combined with a growth rate over the tracked baseline.

use chrono::{DateTime, Utc};

use super::event::{AnomalyEvent, AnomalyType, Severity};
use super::stats::MetricStats;

/// Minimum samples required for leak detection
const MIN_SAMPLES_FOR_DETECTION: usize = 20;

/// Fraction of the window that must be increasing transitions
const MONOTONICITY_THRESHOLD: f64 = 0.8;

/// Minimum growth rate (KB/s) to report a leak
const DEFAULT_RATE_THRESHOLD: f64 = 10.0;

/// Detects sustained memory growth in a tracker's window
#[derive(Debug, Clone)]
pub struct LeakDetector {
    /// Samples required before the trend is evaluated
    pub min_samples: usize,
    /// Increasing transitions must exceed this fraction of the sample count
    pub monotonicity_threshold: f64,
    /// Growth rate in KB/s that must be exceeded
    pub rate_threshold: f64,
}

impl LeakDetector {
    pub fn new(rate_threshold: f64) -> Self {
        Self {
            rate_threshold,
            ..Default::default()
        }
    }

    /// Detect a leak pattern in the memory stream
    ///
    /// # Returns
    /// * `Some(LeakAnomaly)` if memory grew steadily and fast enough
    /// * `None` if there is not enough history or no leak pattern
    pub fn detect(&self, stats: &MetricStats) -> Option<LeakAnomaly> {
        if stats.count() < self.min_samples {
            return None;
        }

        let increasing = Self::increasing_transitions(stats);
        if increasing as f64 <= stats.count() as f64 * self.monotonicity_threshold {
            return None;
        }

        let span = stats.time_span_secs();
        if span <= 0.0 {
            return None;
        }

        let current = stats.latest()?;
        let baseline = stats.min();
        let rate = (current - baseline) / span;
        if rate <= self.rate_threshold {
            return None;
        }

        let growth_sigma = if stats.stddev() > 0.0 {
            (current - baseline) / stats.stddev()
        } else {
            0.0
        };

        Some(LeakAnomaly {
            current_kb: current,
            baseline_kb: baseline,
            rate_kb_per_sec: rate,
            growth_sigma,
            increasing_transitions: increasing,
            samples_analyzed: stats.count(),
        })
    }

    /// Count adjacent pairs, newest to oldest, where the newer sample is larger
    fn increasing_transitions(stats: &MetricStats) -> usize {
        stats
            .iter_recent()
            .zip(stats.iter_recent().skip(1))
            .filter(|(newer, older)| newer > older)
            .count()
    }
}

impl Default for LeakDetector {
    fn default() -> Self {
        Self {
            min_samples: MIN_SAMPLES_FOR_DETECTION,
            monotonicity_threshold: MONOTONICITY_THRESHOLD,
            rate_threshold: DEFAULT_RATE_THRESHOLD,
        }
    }
}

/// Memory leak anomaly details
#[derive(Debug, Clone, PartialEq)]
pub struct LeakAnomaly {
    /// Most recent memory sample
    pub current_kb: f64,
    /// Lowest memory value ever tracked
    pub baseline_kb: f64,
    /// Growth over the baseline per second of tracked time
    pub rate_kb_per_sec: f64,
    /// Growth over the baseline in window stddev units
    pub growth_sigma: f64,
    /// Strictly increasing adjacent pairs in the window
    pub increasing_transitions: usize,
    /// Number of samples used in analysis
    pub samples_analyzed: usize,
}

impl LeakAnomaly {
    /// Severity by growth rate
    pub fn severity(&self) -> Severity {
        if self.rate_kb_per_sec > 100.0 {
            Severity::Critical
        } else if self.rate_kb_per_sec > 50.0 {
            Severity::High
        } else if self.rate_kb_per_sec > 20.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Growth rate in MB per hour
    pub fn rate_mb_per_hour(&self) -> f64 {
        self.rate_kb_per_sec * 3600.0 / 1024.0
    }

    pub fn into_event(self, detected_at: DateTime<Utc>) -> AnomalyEvent {
        AnomalyEvent {
            anomaly_type: AnomalyType::MemoryLeak,
            severity: self.severity(),
            value: self.current_kb,
            expected_mean: self.baseline_kb,
            deviation_sigma: self.growth_sigma,
            detected_at,
            description: format!(
                "Potential memory leak: growing from {:.0} KB to {:.0} KB (rate: {:.1} KB/s)",
                self.baseline_kb, self.current_kb, self.rate_kb_per_sec
            ),
        }
    }
}
