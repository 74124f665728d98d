//! Anomaly event types and the bounded per-tick event batch

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Anomaly classification
///
/// Memory point anomalies are reported as `MemorySpike` in both directions;
/// there is no separate memory-drop type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnomalyType {
    None,
    CpuSpike,
    CpuDrop,
    MemorySpike,
    MemoryLeak,
    IoSpike,
    IoStall,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::None => "none",
            AnomalyType::CpuSpike => "cpu-spike",
            AnomalyType::CpuDrop => "cpu-drop",
            AnomalyType::MemorySpike => "memory-spike",
            AnomalyType::MemoryLeak => "memory-leak",
            AnomalyType::IoSpike => "io-spike",
            AnomalyType::IoStall => "io-stall",
        }
    }
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity levels, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected anomaly, owned by the caller once returned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    #[serde(rename = "type")]
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    /// Sample that triggered the event
    pub value: f64,
    /// Window mean for point anomalies, growth baseline (tracked minimum) for leaks
    pub expected_mean: f64,
    /// z-score for point anomalies, growth over baseline in stddev units for leaks
    pub deviation_sigma: f64,
    pub detected_at: DateTime<Utc>,
    pub description: String,
}

/// Events produced by a single check, bounded by a fixed capacity
///
/// Pushing into a full batch drops the event and counts it, so callers can
/// see how much was truncated without the batch ever growing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EventBatch {
    events: Vec<AnomalyEvent>,
    capacity: usize,
    dropped: usize,
}

impl EventBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append an event; returns false and counts it as dropped when full
    pub fn push(&mut self, event: AnomalyEvent) -> bool {
        if self.is_full() {
            self.dropped += 1;
            return false;
        }
        self.events.push(event);
        true
    }

    pub fn is_full(&self) -> bool {
        self.events.len() >= self.capacity
    }

    /// Number of events kept
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of events rejected because the batch was full
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn events(&self) -> &[AnomalyEvent] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AnomalyEvent> {
        self.events.iter()
    }

    pub fn into_vec(self) -> Vec<AnomalyEvent> {
        self.events
    }
}

impl IntoIterator for EventBatch {
    type Item = AnomalyEvent;
    type IntoIter = std::vec::IntoIter<AnomalyEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a EventBatch {
    type Item = &'a AnomalyEvent;
    type IntoIter = std::slice::Iter<'a, AnomalyEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(anomaly_type: AnomalyType) -> AnomalyEvent {
        AnomalyEvent {
            anomaly_type,
            severity: Severity::Low,
            value: 1.0,
            expected_mean: 0.5,
            deviation_sigma: 2.2,
            detected_at: Utc::now(),
            description: String::new(),
        }
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn test_type_names() {
        assert_eq!(AnomalyType::CpuSpike.to_string(), "cpu-spike");
        assert_eq!(AnomalyType::MemoryLeak.to_string(), "memory-leak");
        assert_eq!(AnomalyType::IoStall.to_string(), "io-stall");
        assert_eq!(
            serde_json::to_string(&AnomalyType::CpuDrop).unwrap(),
            "\"cpu-drop\""
        );
    }

    #[test]
    fn test_event_serializes_type_field() {
        let json = serde_json::to_value(event(AnomalyType::IoSpike)).unwrap();
        assert_eq!(json["type"], "io-spike");
        assert_eq!(json["severity"], "low");
    }

    #[test]
    fn test_batch_truncates_and_counts() {
        let mut batch = EventBatch::with_capacity(2);
        assert!(batch.push(event(AnomalyType::CpuSpike)));
        assert!(batch.push(event(AnomalyType::MemorySpike)));
        assert!(batch.is_full());

        assert!(!batch.push(event(AnomalyType::MemoryLeak)));
        assert!(!batch.push(event(AnomalyType::IoSpike)));

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.dropped(), 2);
        let types: Vec<AnomalyType> = batch.iter().map(|e| e.anomaly_type).collect();
        assert_eq!(types, vec![AnomalyType::CpuSpike, AnomalyType::MemorySpike]);
    }

    #[test]
    fn test_zero_capacity_batch_accepts_nothing() {
        let mut batch = EventBatch::with_capacity(0);
        assert!(batch.is_full());
        assert!(!batch.push(event(AnomalyType::CpuSpike)));
        assert!(batch.is_empty());
        assert_eq!(batch.dropped(), 1);
    }
}
