//! Streaming anomaly detection for process resource usage
//!
//! This crate provides:
//! - Sliding-window statistics over CPU, memory and I/O samples
//! - Point anomaly classification and memory leak trend detection
//! - Process sampling from procfs with a per-process sampling loop
//! - CSV/JSON export and console rendering of anomalies
//! - Health checks, Prometheus metrics and an HTTP API

pub mod anomaly;
pub mod api;
pub mod display;
pub mod error;
pub mod export;
pub mod health;
pub mod models;
pub mod observability;
pub mod sampler;

pub use anomaly::{
    AnomalyDetector, AnomalyEvent, AnomalyType, DetectorSnapshot, EventBatch, MetricStats,
    Severity, StatsSnapshot,
};
pub use error::{DetectorError, ExportError, SampleError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{DetectorMetrics, StructuredLogger};
