//! Process sampling
//!
//! This module provides the metric sources that read a process's resource
//! usage and the per-process loop that feeds them into an anomaly detector.
//! Each monitored process gets its own detector behind its own lock; readers
//! only ever receive copies of the latest events and statistics.

mod r#loop;
mod procfs;

pub use procfs::{ProcfsSource, DEFAULT_CLOCK_TICKS};
pub use r#loop::{SamplingConfig, SamplingLoop};

use crate::anomaly::{AnomalyDetector, AnomalyEvent, DetectorSnapshot};
use crate::error::SampleError;
use crate::models::ProcessSample;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub use async_trait::async_trait;

/// Trait for process metric sources
#[async_trait]
pub trait MetricSource: Send {
    /// Process this source reads
    fn pid(&self) -> u32;

    /// Take one reading of the process
    async fn sample(&mut self) -> Result<ProcessSample, SampleError>;
}

/// Shared handle to one process's detector and its latest events
#[derive(Debug, Clone)]
pub struct ProcessMonitor {
    pid: u32,
    detector: Arc<Mutex<AnomalyDetector>>,
    latest_events: Arc<RwLock<Vec<AnomalyEvent>>>,
}

impl ProcessMonitor {
    pub fn new(detector: AnomalyDetector) -> Option<Self> {
        let pid = detector.pid()?;
        Some(Self {
            pid,
            detector: Arc::new(Mutex::new(detector)),
            latest_events: Arc::new(RwLock::new(Vec::new())),
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Detector lock, held across a tick's whole update/check sequence
    pub fn detector(&self) -> &Arc<Mutex<AnomalyDetector>> {
        &self.detector
    }

    /// Replace the published events of the latest tick
    pub async fn publish(&self, events: Vec<AnomalyEvent>) {
        *self.latest_events.write().await = events;
    }

    /// Copy of the events from the latest tick
    pub async fn latest_events(&self) -> Vec<AnomalyEvent> {
        self.latest_events.read().await.clone()
    }

    /// Copy of the detector's current statistics
    pub async fn snapshot(&self) -> DetectorSnapshot {
        self.detector.lock().await.snapshot()
    }
}

/// Registry of monitored processes keyed by pid
#[derive(Debug, Default)]
pub struct MonitorRegistry {
    monitors: RwLock<HashMap<u32, ProcessMonitor>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, monitor: ProcessMonitor) {
        self.monitors.write().await.insert(monitor.pid(), monitor);
    }

    pub async fn remove(&self, pid: u32) -> Option<ProcessMonitor> {
        self.monitors.write().await.remove(&pid)
    }

    pub async fn get(&self, pid: u32) -> Option<ProcessMonitor> {
        self.monitors.read().await.get(&pid).cloned()
    }

    /// Monitored pids in ascending order
    pub async fn pids(&self) -> Vec<u32> {
        let mut pids: Vec<u32> = self.monitors.read().await.keys().copied().collect();
        pids.sort_unstable();
        pids
    }

    pub async fn len(&self) -> usize {
        self.monitors.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.monitors.read().await.is_empty()
    }

    /// Latest events of every process, keyed by pid
    pub async fn latest_events(&self) -> HashMap<u32, Vec<AnomalyEvent>> {
        let monitors: Vec<ProcessMonitor> = self.monitors.read().await.values().cloned().collect();
        let mut all = HashMap::with_capacity(monitors.len());
        for monitor in monitors {
            all.insert(monitor.pid(), monitor.latest_events().await);
        }
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monitor_requires_identity() {
        assert!(ProcessMonitor::new(AnomalyDetector::default()).is_none());
        let monitor = ProcessMonitor::new(AnomalyDetector::new(12).unwrap()).unwrap();
        assert_eq!(monitor.pid(), 12);
    }

    #[tokio::test]
    async fn test_registry_lookup() {
        let registry = MonitorRegistry::new();
        for pid in [30, 10, 20] {
            let monitor = ProcessMonitor::new(AnomalyDetector::new(pid).unwrap()).unwrap();
            registry.insert(monitor).await;
        }

        assert_eq!(registry.pids().await, vec![10, 20, 30]);
        assert!(registry.get(20).await.is_some());
        assert!(registry.get(99).await.is_none());

        assert!(registry.remove(20).await.is_some());
        assert_eq!(registry.len().await, 2);
    }

    #[tokio::test]
    async fn test_published_events_are_copies() {
        let monitor = ProcessMonitor::new(AnomalyDetector::new(1).unwrap()).unwrap();
        assert!(monitor.latest_events().await.is_empty());

        monitor.publish(Vec::new()).await;
        let snapshot = monitor.snapshot().await;
        monitor.detector().lock().await.update_cpu(50.0);

        assert_eq!(snapshot.cpu.count, 0);
        assert_eq!(monitor.snapshot().await.cpu.count, 1);
    }
}
