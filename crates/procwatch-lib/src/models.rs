//! Core data models for procwatch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One reading of a monitored process
///
/// Rates are derived from counter deltas, so the first reading of a process
/// carries no CPU or I/O values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSample {
    pub pid: u32,
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: Option<f64>,
    pub memory_kb: f64,
    pub io_read_kb_per_sec: Option<f64>,
    pub io_write_kb_per_sec: Option<f64>,
}

/// Cumulative counters read from procfs for delta computation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessCounters {
    /// utime + stime in clock ticks
    pub cpu_ticks: u64,
    /// Resident set size in KB
    pub rss_kb: u64,
    /// Bytes fetched from storage, if /proc/<pid>/io was readable
    pub read_bytes: Option<u64>,
    /// Bytes sent to storage, if /proc/<pid>/io was readable
    pub write_bytes: Option<u64>,
}
