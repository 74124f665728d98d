//! Per-process anomaly detector
//!
//! Owns one statistics tracker per metric stream of a monitored process and
//! turns each tick's most recent samples into anomaly events.
//!
//! The detector is a plain synchronous state machine. When the sampling loop
//! and a reporting path share one, wrap it in a single mutex held across the
//! whole update/check sequence of a tick.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::classifier::MetricFamily;
use super::event::EventBatch;
use super::leak_detector::LeakDetector;
use super::stats::{MetricStats, StatsSnapshot};
use crate::error::DetectorError;

/// Lifecycle state of a detector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorState {
    #[default]
    Uninitialized,
    Initialized,
    Destroyed,
}

/// Anomaly detector for a single process
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    pid: Option<u32>,
    state: DetectorState,
    cpu: MetricStats,
    memory: MetricStats,
    io_read: MetricStats,
    io_write: MetricStats,
    leak_detector: LeakDetector,
}

impl AnomalyDetector {
    /// Create an initialized detector for `pid`
    pub fn new(pid: u32) -> Result<Self, DetectorError> {
        let mut detector = Self::default();
        detector.init(pid)?;
        Ok(detector)
    }

    /// Use a custom leak detector instead of the default thresholds
    pub fn with_leak_detector(mut self, leak_detector: LeakDetector) -> Self {
        self.leak_detector = leak_detector;
        self
    }

    /// Zero all trackers and start monitoring `pid`
    pub fn init(&mut self, pid: u32) -> Result<(), DetectorError> {
        if self.state == DetectorState::Destroyed {
            return Err(DetectorError::Destroyed);
        }
        if pid == 0 {
            return Err(DetectorError::InvalidPid(pid));
        }

        self.clear_trackers();
        self.pid = Some(pid);
        self.state = DetectorState::Initialized;
        Ok(())
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == DetectorState::Initialized
    }

    /// Record a CPU usage sample (percent)
    pub fn update_cpu(&mut self, cpu_percent: f64) {
        self.update_cpu_at(cpu_percent, Utc::now());
    }

    pub fn update_cpu_at(&mut self, cpu_percent: f64, timestamp: DateTime<Utc>) {
        if self.is_initialized() {
            self.cpu.update_at(cpu_percent, timestamp);
        }
    }

    /// Record a resident memory sample (KB)
    pub fn update_memory(&mut self, memory_kb: f64) {
        self.update_memory_at(memory_kb, Utc::now());
    }

    pub fn update_memory_at(&mut self, memory_kb: f64, timestamp: DateTime<Utc>) {
        if self.is_initialized() {
            self.memory.update_at(memory_kb, timestamp);
        }
    }

    /// Record I/O read and write rates (KB/s); both streams advance together
    pub fn update_io(&mut self, read_rate: f64, write_rate: f64) {
        self.update_io_at(read_rate, write_rate, Utc::now());
    }

    pub fn update_io_at(&mut self, read_rate: f64, write_rate: f64, timestamp: DateTime<Utc>) {
        if self.is_initialized() {
            self.io_read.update_at(read_rate, timestamp);
            self.io_write.update_at(write_rate, timestamp);
        }
    }

    /// Check the latest samples for anomalies, keeping at most `max_events`
    pub fn check(&self, max_events: usize) -> EventBatch {
        self.check_at(max_events, Utc::now())
    }

    /// Check the latest samples, stamping events with `now`
    ///
    /// Streams are evaluated in a fixed order: CPU, memory, memory leak
    /// trend, I/O write. Events past `max_events` are counted as dropped.
    pub fn check_at(&self, max_events: usize, now: DateTime<Utc>) -> EventBatch {
        let mut batch = EventBatch::with_capacity(max_events);
        if !self.is_initialized() || max_events == 0 {
            return batch;
        }

        if let Some(current) = self.cpu.latest() {
            if let Some(event) = MetricFamily::Cpu.classify(&self.cpu.snapshot(), current, now) {
                batch.push(event);
            }
        }

        if let Some(current) = self.memory.latest() {
            if let Some(event) =
                MetricFamily::Memory.classify(&self.memory.snapshot(), current, now)
            {
                batch.push(event);
            }

            if let Some(leak) = self.leak_detector.detect(&self.memory) {
                batch.push(leak.into_event(now));
            }
        }

        if let Some(current) = self.io_write.latest() {
            if let Some(event) =
                MetricFamily::IoWrite.classify(&self.io_write.snapshot(), current, now)
            {
                batch.push(event);
            }
        }

        if batch.dropped() > 0 {
            debug!(
                pid = ?self.pid,
                kept = batch.len(),
                dropped = batch.dropped(),
                "Anomaly batch truncated"
            );
        }

        batch
    }

    /// Clear all statistics, keeping the monitored pid
    pub fn reset(&mut self) {
        if self.state == DetectorState::Destroyed || self.pid.is_none() {
            return;
        }
        self.clear_trackers();
        self.state = DetectorState::Initialized;
    }

    /// Discard all state including the pid; the detector cannot be reused
    pub fn cleanup(&mut self) {
        self.clear_trackers();
        self.pid = None;
        self.state = DetectorState::Destroyed;
    }

    fn clear_trackers(&mut self) {
        self.cpu.clear();
        self.memory.clear();
        self.io_read.clear();
        self.io_write.clear();
    }

    pub fn cpu_stats(&self) -> &MetricStats {
        &self.cpu
    }

    pub fn memory_stats(&self) -> &MetricStats {
        &self.memory
    }

    pub fn io_read_stats(&self) -> &MetricStats {
        &self.io_read
    }

    pub fn io_write_stats(&self) -> &MetricStats {
        &self.io_write
    }

    /// Copy of every stream's aggregates for reporting
    pub fn snapshot(&self) -> DetectorSnapshot {
        DetectorSnapshot {
            pid: self.pid,
            state: self.state,
            cpu: self.cpu.snapshot(),
            memory: self.memory.snapshot(),
            io_read: self.io_read.snapshot(),
            io_write: self.io_write.snapshot(),
        }
    }
}

/// Point-in-time statistics of a detector, safe to hand to readers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorSnapshot {
    pub pid: Option<u32>,
    pub state: DetectorState,
    pub cpu: StatsSnapshot,
    pub memory: StatsSnapshot,
    pub io_read: StatsSnapshot,
    pub io_write: StatsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::classifier::NEAR_CONSTANT_SIGMA;
    use crate::anomaly::event::{AnomalyType, Severity};
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        start() + Duration::seconds(secs)
    }

    /// Baseline noise on every stream, then one outlier per stream on the last tick
    /// and steady memory growth so the leak trend fires too
    fn detector_with_four_anomalies() -> AnomalyDetector {
        let mut detector = AnomalyDetector::new(4242).unwrap();
        for i in 0..29i64 {
            let noise = if i % 2 == 0 { 10.0 } else { 12.0 };
            detector.update_cpu_at(noise, at(i));
            detector.update_memory_at(1_000.0 + i as f64 * 100.0, at(i));
            detector.update_io_at(noise, noise, at(i));
        }
        detector.update_cpu_at(90.0, at(29));
        detector.update_memory_at(100_000.0, at(29));
        detector.update_io_at(90.0, 90.0, at(29));
        detector
    }

    #[test]
    fn test_init_rejects_zero_pid() {
        let mut detector = AnomalyDetector::default();
        assert_eq!(detector.init(0), Err(DetectorError::InvalidPid(0)));
        assert_eq!(detector.state(), DetectorState::Uninitialized);
        assert!(AnomalyDetector::new(0).is_err());
    }

    #[test]
    fn test_uninitialized_is_inert() {
        let mut detector = AnomalyDetector::default();
        for i in 0..50 {
            detector.update_cpu(i as f64);
            detector.update_memory(i as f64);
            detector.update_io(1.0, 2.0);
        }

        assert!(detector.cpu_stats().is_empty());
        assert!(detector.memory_stats().is_empty());
        assert!(detector.check(10).is_empty());
    }

    #[test]
    fn test_io_update_advances_both_streams() {
        let mut detector = AnomalyDetector::new(1).unwrap();
        detector.update_io(5.0, 7.0);

        assert_eq!(detector.io_read_stats().latest(), Some(5.0));
        assert_eq!(detector.io_write_stats().latest(), Some(7.0));
        assert_eq!(detector.io_read_stats().count(), 1);
        assert_eq!(detector.io_write_stats().count(), 1);
    }

    #[test]
    fn test_fewer_than_ten_samples_never_flag() {
        let mut detector = AnomalyDetector::new(1).unwrap();
        for v in [1.0, 500.0, 2.0, 900.0, 0.0, 3.0, 10_000.0, 4.0, 99.0] {
            detector.update_cpu(v);
            detector.update_memory(v);
            detector.update_io(v, v);
            assert!(detector.check(10).is_empty());
        }
    }

    #[test]
    fn test_all_four_checks_in_order() {
        let detector = detector_with_four_anomalies();
        let batch = detector.check_at(10, at(30));

        let types: Vec<AnomalyType> = batch.iter().map(|e| e.anomaly_type).collect();
        assert_eq!(
            types,
            vec![
                AnomalyType::CpuSpike,
                AnomalyType::MemorySpike,
                AnomalyType::MemoryLeak,
                AnomalyType::IoSpike,
            ]
        );
        assert!(batch.iter().all(|e| e.detected_at == at(30)));
        assert_eq!(batch.dropped(), 0);
    }

    #[test]
    fn test_cap_enforcement() {
        let detector = detector_with_four_anomalies();
        let batch = detector.check_at(2, at(30));

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.dropped(), 2);
        assert_eq!(batch.events()[0].anomaly_type, AnomalyType::CpuSpike);
        assert_eq!(batch.events()[1].anomaly_type, AnomalyType::MemorySpike);
    }

    #[test]
    fn test_zero_max_events() {
        let detector = detector_with_four_anomalies();
        let batch = detector.check(0);
        assert!(batch.is_empty());
        assert_eq!(batch.dropped(), 0);
    }

    #[test]
    fn test_leak_scenario() {
        let mut detector = AnomalyDetector::new(77).unwrap();
        for i in 0..25i64 {
            let value = 1_000.0 + i as f64 * 2_500.0 / 24.0;
            detector.update_memory_at(value, start() + Duration::milliseconds(i * 20_000 / 24));
        }

        let batch = detector.check_at(10, at(20));
        let leak = batch
            .iter()
            .find(|e| e.anomaly_type == AnomalyType::MemoryLeak)
            .expect("leak event");

        assert_eq!(leak.severity, Severity::Critical);
        assert_eq!(leak.value, 3_500.0);
        assert_eq!(leak.expected_mean, 1_000.0);
        // a steady ramp is not a point anomaly
        assert_eq!(batch.len(), 1);
    }

    #[test]
    fn test_cpu_drop_on_latest_sample() {
        let mut detector = AnomalyDetector::new(5).unwrap();
        for i in 0..20i64 {
            detector.update_cpu_at(if i % 2 == 0 { 60.0 } else { 62.0 }, at(i));
        }
        detector.update_cpu_at(5.0, at(20));

        let batch = detector.check_at(10, at(20));
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.events()[0].anomaly_type, AnomalyType::CpuDrop);
        assert_eq!(batch.events()[0].value, 5.0);
    }

    #[test]
    fn test_io_stall_uses_write_stream_only() {
        let mut detector = AnomalyDetector::new(5).unwrap();
        for i in 0..20i64 {
            let write = if i % 2 == 0 { 400.0 } else { 410.0 };
            detector.update_io_at(0.0, write, at(i));
        }
        // read rate jumps, write rate collapses
        detector.update_io_at(10_000.0, 0.0, at(20));

        let batch = detector.check_at(10, at(20));
        assert_eq!(batch.len(), 1);
        assert_eq!(batch.events()[0].anomaly_type, AnomalyType::IoStall);
    }

    #[test]
    fn test_near_constant_memory_step() {
        let mut detector = AnomalyDetector::new(9).unwrap();
        for i in 0..15i64 {
            detector.update_memory_at(50.0, at(i));
        }
        let snapshot = detector.memory_stats().snapshot();
        assert_eq!(
            crate::anomaly::is_anomalous(&snapshot, 80.0),
            Some(NEAR_CONSTANT_SIGMA)
        );
    }

    #[test]
    fn test_reset_idempotence() {
        let feed = |detector: &mut AnomalyDetector| {
            for i in 0..130i64 {
                let v = ((i * 13) % 17) as f64;
                detector.update_cpu_at(v, at(i));
                detector.update_memory_at(v * 100.0, at(i));
                detector.update_io_at(v, v * 2.0, at(i));
            }
        };

        let mut fresh = AnomalyDetector::new(31).unwrap();
        feed(&mut fresh);

        let mut reused = AnomalyDetector::new(31).unwrap();
        for i in 0..40i64 {
            reused.update_cpu_at(1_000.0, at(i));
            reused.update_memory_at(1.0, at(i));
        }
        reused.reset();
        assert_eq!(reused.pid(), Some(31));
        assert!(reused.is_initialized());
        feed(&mut reused);

        assert_eq!(fresh.snapshot(), reused.snapshot());
        assert_eq!(fresh.cpu_stats(), reused.cpu_stats());
        assert_eq!(fresh.memory_stats(), reused.memory_stats());
        assert_eq!(fresh.check_at(10, at(200)), reused.check_at(10, at(200)));
    }

    #[test]
    fn test_cleanup_is_terminal() {
        let mut detector = detector_with_four_anomalies();
        detector.cleanup();

        assert_eq!(detector.pid(), None);
        assert_eq!(detector.state(), DetectorState::Destroyed);
        assert!(detector.memory_stats().is_empty());
        assert!(detector.check(10).is_empty());

        detector.update_cpu(1.0);
        assert!(detector.cpu_stats().is_empty());

        detector.reset();
        assert_eq!(detector.state(), DetectorState::Destroyed);
        assert_eq!(detector.init(10), Err(DetectorError::Destroyed));
    }

    #[test]
    fn test_reset_before_init_is_noop() {
        let mut detector = AnomalyDetector::default();
        detector.reset();
        assert_eq!(detector.state(), DetectorState::Uninitialized);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let mut detector = AnomalyDetector::new(3).unwrap();
        detector.update_cpu(10.0);
        let snapshot = detector.snapshot();
        detector.update_cpu(20.0);

        assert_eq!(snapshot.cpu.count, 1);
        assert_eq!(snapshot.cpu.mean, 10.0);
        assert_eq!(snapshot.pid, Some(3));
        assert_eq!(detector.snapshot().cpu.count, 2);
    }
}
