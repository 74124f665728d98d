//! procwatch - streaming resource anomaly detection for Linux processes
//!
//! Samples each configured process from procfs, runs its statistics through
//! an anomaly detector and reports anomalies through logs, CSV, Prometheus
//! metrics and an HTTP API.

use anyhow::{Context, Result};
use procwatch_lib::{
    anomaly::AnomalyDetector,
    api::{self, AppState},
    display,
    health::{components, HealthRegistry},
    observability::{DetectorMetrics, StructuredLogger},
    sampler::{MonitorRegistry, ProcessMonitor, ProcfsSource, SamplingConfig, SamplingLoop},
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = config::AgentConfig::load(std::env::args().skip(1))?;

    let health_registry = HealthRegistry::new();
    health_registry.register(components::DETECTOR).await;
    if config.csv_path.is_some() {
        health_registry.register(components::EXPORTER).await;
    }

    let metrics = DetectorMetrics::new();
    let logger = StructuredLogger::new(&config.instance);
    logger.log_startup(AGENT_VERSION, &config.pids);

    let monitors = Arc::new(MonitorRegistry::new());
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut sampling_handles = Vec::with_capacity(config.pids.len());

    for &pid in &config.pids {
        let source = ProcfsSource::with_proc_root(pid, &config.proc_root)
            .with_clock_ticks(config.clock_ticks);
        if !source.process_exists().await {
            warn!(pid = pid, "Process not found, skipping");
            continue;
        }

        let detector = AnomalyDetector::new(pid)
            .with_context(|| format!("failed to create detector for pid {}", pid))?;
        let Some(monitor) = ProcessMonitor::new(detector) else {
            continue;
        };
        monitors.insert(monitor.clone()).await;
        health_registry.register(&components::sampler_for(pid)).await;

        let sampling = SamplingLoop::new(
            source,
            monitor,
            SamplingConfig {
                interval: config.interval(),
                max_events: config.max_events,
                csv_path: config.csv_path.clone(),
            },
            metrics.clone(),
            logger.clone(),
        )
        .with_health(health_registry.clone());

        sampling_handles.push(tokio::spawn(sampling.run(shutdown_tx.subscribe())));
    }

    if monitors.is_empty().await {
        anyhow::bail!("none of the configured processes exist");
    }
    metrics.set_processes_monitored(monitors.len().await as i64);

    let app_state = Arc::new(AppState::new(
        health_registry.clone(),
        metrics.clone(),
        monitors.clone(),
    ));
    health_registry.set_ready(true).await;

    let api_handle = tokio::spawn(api::serve(config.api_port, app_state));

    tokio::signal::ctrl_c().await?;
    logger.log_shutdown("SIGINT received");

    let _ = shutdown_tx.send(());
    for handle in sampling_handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "Sampling task failed");
        }
    }
    api_handle.abort();

    for pid in monitors.pids().await {
        if let Some(monitor) = monitors.remove(pid).await {
            let mut detector = monitor.detector().lock().await;
            println!("{}", display::render_stats(&detector.snapshot()));
            detector.cleanup();
        }
    }
    metrics.set_processes_monitored(0);

    info!("Shutdown complete");
    Ok(())
}
