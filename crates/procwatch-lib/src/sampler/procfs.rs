//! procfs metrics source
//!
//! Reads per-process counters from the proc filesystem:
//! - /proc/<pid>/stat for utime + stime
//! - /proc/<pid>/status for VmRSS
//! - /proc/<pid>/io for read_bytes / write_bytes

use super::MetricSource;
use crate::error::SampleError;
use crate::models::{ProcessCounters, ProcessSample};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tracing::debug;

/// USER_HZ on practically every Linux build
pub const DEFAULT_CLOCK_TICKS: u64 = 100;

/// Reads one process's resource usage from procfs
pub struct ProcfsSource {
    pid: u32,
    proc_root: PathBuf,
    clock_ticks: u64,
    previous: Option<(Instant, ProcessCounters)>,
}

impl ProcfsSource {
    pub fn new(pid: u32) -> Self {
        Self::with_proc_root(pid, "/proc")
    }

    /// Create a source with a custom proc root (for testing)
    pub fn with_proc_root(pid: u32, proc_root: impl Into<PathBuf>) -> Self {
        Self {
            pid,
            proc_root: proc_root.into(),
            clock_ticks: DEFAULT_CLOCK_TICKS,
            previous: None,
        }
    }

    pub fn with_clock_ticks(mut self, clock_ticks: u64) -> Self {
        self.clock_ticks = clock_ticks.max(1);
        self
    }

    fn process_dir(&self) -> PathBuf {
        self.proc_root.join(self.pid.to_string())
    }

    /// Check whether the process directory exists
    pub async fn process_exists(&self) -> bool {
        fs::metadata(self.process_dir()).await.is_ok()
    }

    /// Parse /proc/<pid>/stat contents
    /// Returns utime + stime in clock ticks
    pub fn parse_stat(content: &str) -> Result<u64, String> {
        // comm may contain spaces and parentheses, fields resume after the last ')'
        let rest = content
            .rfind(')')
            .map(|idx| &content[idx + 1..])
            .ok_or_else(|| "missing command name".to_string())?;

        let fields: Vec<&str> = rest.split_whitespace().collect();
        // state is fields[0], utime and stime are overall fields 14 and 15
        if fields.len() < 13 {
            return Err(format!("expected at least 13 fields after comm, got {}", fields.len()));
        }

        let utime: u64 = fields[11]
            .parse()
            .map_err(|e| format!("invalid utime '{}': {}", fields[11], e))?;
        let stime: u64 = fields[12]
            .parse()
            .map_err(|e| format!("invalid stime '{}': {}", fields[12], e))?;

        Ok(utime + stime)
    }

    /// Parse VmRSS (KB) from /proc/<pid>/status contents
    pub fn parse_status_rss(content: &str) -> Option<u64> {
        content
            .lines()
            .find_map(|line| line.strip_prefix("VmRSS:"))
            .and_then(|rest| rest.split_whitespace().next())
            .and_then(|value| value.parse().ok())
    }

    /// Parse /proc/<pid>/io contents
    /// Returns (read_bytes, write_bytes)
    pub fn parse_io(content: &str) -> (Option<u64>, Option<u64>) {
        let mut read_bytes = None;
        let mut write_bytes = None;

        for line in content.lines() {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 2 {
                match parts[0] {
                    "read_bytes:" => read_bytes = parts[1].parse().ok(),
                    "write_bytes:" => write_bytes = parts[1].parse().ok(),
                    _ => {}
                }
            }
        }

        (read_bytes, write_bytes)
    }

    async fn read_file(path: &Path) -> Result<String, SampleError> {
        fs::read_to_string(path)
            .await
            .map_err(|source| SampleError::Read {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Read the raw cumulative counters for the process
    pub async fn read_counters(&self) -> Result<ProcessCounters, SampleError> {
        if !self.process_exists().await {
            return Err(SampleError::ProcessNotFound(self.pid));
        }
        let dir = self.process_dir();

        let stat_path = dir.join("stat");
        let stat = Self::read_file(&stat_path).await?;
        let cpu_ticks = Self::parse_stat(&stat).map_err(|reason| SampleError::Parse {
            path: stat_path,
            reason,
        })?;

        // Kernel threads have no VmRSS line
        let status = Self::read_file(&dir.join("status")).await?;
        let rss_kb = Self::parse_status_rss(&status).unwrap_or(0);

        // /proc/<pid>/io needs ptrace access to the target; go without I/O rates if denied
        let (read_bytes, write_bytes) = match Self::read_file(&dir.join("io")).await {
            Ok(io) => Self::parse_io(&io),
            Err(e) => {
                debug!(pid = self.pid, error = %e, "I/O counters unavailable");
                (None, None)
            }
        };

        Ok(ProcessCounters {
            cpu_ticks,
            rss_kb,
            read_bytes,
            write_bytes,
        })
    }

    /// Turn a counter pair into a sample
    ///
    /// `previous` is the earlier reading and the seconds elapsed since it.
    /// Without one, or with a non-positive interval, only memory is reported.
    pub fn derive_sample(
        pid: u32,
        timestamp: DateTime<Utc>,
        current: &ProcessCounters,
        previous: Option<(&ProcessCounters, f64)>,
        clock_ticks: u64,
    ) -> ProcessSample {
        let mut sample = ProcessSample {
            pid,
            timestamp,
            cpu_percent: None,
            memory_kb: current.rss_kb as f64,
            io_read_kb_per_sec: None,
            io_write_kb_per_sec: None,
        };

        let Some((prev, elapsed)) = previous else {
            return sample;
        };
        if elapsed <= 0.0 {
            return sample;
        }

        let cpu_secs = current.cpu_ticks.saturating_sub(prev.cpu_ticks) as f64 / clock_ticks as f64;
        sample.cpu_percent = Some(cpu_secs / elapsed * 100.0);

        let rate = |now: Option<u64>, before: Option<u64>| match (now, before) {
            (Some(now), Some(before)) => Some(now.saturating_sub(before) as f64 / 1024.0 / elapsed),
            _ => None,
        };
        sample.io_read_kb_per_sec = rate(current.read_bytes, prev.read_bytes);
        sample.io_write_kb_per_sec = rate(current.write_bytes, prev.write_bytes);

        sample
    }
}

#[async_trait]
impl MetricSource for ProcfsSource {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn sample(&mut self) -> Result<ProcessSample, SampleError> {
        let counters = self.read_counters().await?;
        let now = Instant::now();

        let previous = self
            .previous
            .as_ref()
            .map(|(at, prev)| (prev, now.duration_since(*at).as_secs_f64()));
        let sample =
            Self::derive_sample(self.pid, Utc::now(), &counters, previous, self.clock_ticks);

        self.previous = Some((now, counters));
        Ok(sample)
    }
}
