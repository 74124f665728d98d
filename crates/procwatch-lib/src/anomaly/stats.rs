//! Bounded online statistics for a single metric stream
//!
//! Mean and population standard deviation are recomputed from the retained
//! window on every update, so there is no drift from incremental updates.
//! `min`/`max` are running extrema over every sample ever seen and are not
//! narrowed when old samples fall out of the window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ring::SampleRing;

/// Statistics tracker for one metric stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricStats {
    samples: SampleRing,
    mean: f64,
    stddev: f64,
    min: f64,
    max: f64,
    first_sample_time: Option<DateTime<Utc>>,
    last_sample_time: Option<DateTime<Utc>>,
}

impl MetricStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sample taken now
    pub fn update(&mut self, value: f64) {
        self.update_at(value, Utc::now());
    }

    /// Record a sample taken at `timestamp`
    pub fn update_at(&mut self, value: f64, timestamp: DateTime<Utc>) {
        if self.samples.is_empty() {
            self.first_sample_time = Some(timestamp);
            self.min = value;
            self.max = value;
        }

        self.samples.push(value);
        self.last_sample_time = Some(timestamp);

        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }

        self.recalculate();
    }

    /// Recompute mean and population standard deviation over the window
    fn recalculate(&mut self) {
        let window = self.samples.as_slice();
        let n = window.len() as f64;

        self.mean = window.iter().sum::<f64>() / n;

        let variance = window
            .iter()
            .map(|v| (v - self.mean).powi(2))
            .sum::<f64>()
            / n;
        self.stddev = variance.sqrt();
    }

    /// Number of valid samples in the window
    pub fn count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn stddev(&self) -> f64 {
        self.stddev
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Most recently inserted sample
    pub fn latest(&self) -> Option<f64> {
        self.samples.latest()
    }

    /// Retained samples, newest first
    pub fn iter_recent(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter_recent()
    }

    pub fn first_sample_time(&self) -> Option<DateTime<Utc>> {
        self.first_sample_time
    }

    pub fn last_sample_time(&self) -> Option<DateTime<Utc>> {
        self.last_sample_time
    }

    /// Seconds between the first-ever and the most recent sample
    pub fn time_span_secs(&self) -> f64 {
        match (self.first_sample_time, self.last_sample_time) {
            (Some(first), Some(last)) => (last - first).num_milliseconds() as f64 / 1000.0,
            _ => 0.0,
        }
    }

    /// Copy of the current aggregates for classification and reporting
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            count: self.count(),
            mean: self.mean,
            stddev: self.stddev,
            min: self.min,
            max: self.max,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Point-in-time aggregates of a [`MetricStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub count: usize,
    pub mean: f64,
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
}
