//! Per-process sampling loop
//!
//! Periodically reads one process, feeds the reading into its detector,
//! and publishes, logs and exports whatever anomalies the tick produced.

use super::{MetricSource, ProcessMonitor};
use crate::anomaly::AnomalyEvent;
use crate::error::SampleError;
use crate::export;
use crate::health::{components, HealthRegistry};
use crate::observability::{DetectorMetrics, StructuredLogger};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

/// Configuration for a sampling loop
#[derive(Debug, Clone)]
pub struct SamplingConfig {
    /// Time between samples (default: 1 second)
    pub interval: Duration,
    /// Maximum anomaly events kept per tick (default: 10)
    pub max_events: usize,
    /// CSV file anomalies are appended to, if any
    pub csv_path: Option<PathBuf>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_events: 10,
            csv_path: None,
        }
    }
}

/// Sampling loop driving one process's detector
pub struct SamplingLoop<S: MetricSource> {
    source: S,
    monitor: ProcessMonitor,
    config: SamplingConfig,
    metrics: DetectorMetrics,
    logger: StructuredLogger,
    health: Option<HealthRegistry>,
}

impl<S: MetricSource> SamplingLoop<S> {
    pub fn new(
        source: S,
        monitor: ProcessMonitor,
        config: SamplingConfig,
        metrics: DetectorMetrics,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            source,
            monitor,
            config,
            metrics,
            logger,
            health: None,
        }
    }

    /// Report sampler health for this process to the registry
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Run until shutdown is signalled or the process exits
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        let pid = self.monitor.pid();
        self.logger
            .log_monitoring_started(pid, self.config.interval.as_secs_f64());

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let component = components::sampler_for(pid);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(events) => {
                            if !events.is_empty() {
                                debug!(pid = pid, events = events.len(), "Tick produced anomalies");
                            }
                            if let Some(health) = &self.health {
                                health.set_healthy(&component).await;
                            }
                        }
                        Err(SampleError::ProcessNotFound(_)) => {
                            info!(pid = pid, "Monitored process exited, stopping sampling loop");
                            if let Some(health) = &self.health {
                                health.set_degraded(&component, "process exited").await;
                            }
                            break;
                        }
                        Err(e) => {
                            self.metrics.inc_sample_errors();
                            self.logger.log_sample_error(pid, &e);
                            if let Some(health) = &self.health {
                                health.set_degraded(&component, e.to_string()).await;
                            }
                        }
                    }
                }
                _ = shutdown.recv() => {
                    info!(pid = pid, "Shutting down sampling loop");
                    break;
                }
            }
        }
    }

    /// Take one sample, update the detector and collect the tick's anomalies
    pub async fn tick(&mut self) -> Result<Vec<AnomalyEvent>, SampleError> {
        let sample = self.source.sample().await?;
        let pid = self.monitor.pid();
        let start = Instant::now();

        let batch = {
            let mut detector = self.monitor.detector().lock().await;
            if let Some(cpu) = sample.cpu_percent {
                detector.update_cpu_at(cpu, sample.timestamp);
            }
            detector.update_memory_at(sample.memory_kb, sample.timestamp);
            if let (Some(read), Some(write)) =
                (sample.io_read_kb_per_sec, sample.io_write_kb_per_sec)
            {
                detector.update_io_at(read, write, sample.timestamp);
            }
            detector.check_at(self.config.max_events, sample.timestamp)
        };

        self.metrics
            .observe_check_latency(start.elapsed().as_secs_f64());
        self.metrics.inc_samples_ingested();

        if batch.dropped() > 0 {
            self.logger.log_truncated(pid, batch.len(), batch.dropped());
            self.metrics.add_anomalies_dropped(batch.dropped());
        }

        for event in &batch {
            self.logger.log_anomaly(pid, event);
            self.metrics.record_anomaly(event);
        }

        let events = batch.into_vec();

        if let Some(path) = &self.config.csv_path {
            if !events.is_empty() {
                match export::export_csv(path, &events, true) {
                    Ok(()) => {
                        if let Some(health) = &self.health {
                            health.set_healthy(components::EXPORTER).await;
                        }
                    }
                    Err(e) => {
                        self.metrics.inc_export_errors();
                        self.logger.log_export_error(pid, &e);
                        if let Some(health) = &self.health {
                            health.set_degraded(components::EXPORTER, e.to_string()).await;
                        }
                    }
                }
            }
        }

        self.monitor.publish(events.clone()).await;
        Ok(events)
    }
}
