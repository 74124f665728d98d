//! Agent configuration

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Agent configuration, read from `PROCWATCH_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Processes to monitor (`PROCWATCH_PIDS=123,456`)
    #[serde(default)]
    pub pids: Vec<u32>,

    /// Sampling interval in seconds
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// API server port for health/metrics/anomalies
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Maximum anomaly events kept per process per tick
    #[serde(default = "default_max_events")]
    pub max_events: usize,

    /// CSV file anomalies are appended to
    #[serde(default)]
    pub csv_path: Option<PathBuf>,

    #[serde(default = "default_proc_root")]
    pub proc_root: PathBuf,

    /// Kernel clock ticks per second (USER_HZ)
    #[serde(default = "default_clock_ticks")]
    pub clock_ticks: u64,

    /// Instance name attached to structured logs
    #[serde(default = "default_instance")]
    pub instance: String,
}

fn default_interval() -> u64 {
    1
}

fn default_api_port() -> u16 {
    8080
}

fn default_max_events() -> usize {
    10
}

fn default_proc_root() -> PathBuf {
    PathBuf::from("/proc")
}

fn default_clock_ticks() -> u64 {
    100
}

fn default_instance() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "procwatch".to_string())
}

impl AgentConfig {
    /// Load configuration from the environment
    ///
    /// Pids given as command-line arguments are monitored in addition to
    /// `PROCWATCH_PIDS`.
    pub fn load(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("PROCWATCH")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("pids"),
            )
            .build()
            .context("failed to read PROCWATCH_* environment")?;

        let mut agent: AgentConfig = config
            .try_deserialize()
            .context("invalid PROCWATCH_* configuration")?;

        for arg in args {
            let pid = arg
                .parse()
                .with_context(|| format!("invalid pid argument '{}'", arg))?;
            agent.pids.push(pid);
        }
        agent.pids.sort_unstable();
        agent.pids.dedup();

        agent.validate()?;
        Ok(agent)
    }

    fn validate(&self) -> Result<()> {
        if self.pids.is_empty() {
            bail!("no processes to monitor: set PROCWATCH_PIDS or pass pids as arguments");
        }
        if self.interval_secs == 0 {
            bail!("PROCWATCH_INTERVAL_SECS must be at least 1");
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}
