//! Console rendering of anomaly events and detector statistics

use crate::anomaly::{AnomalyEvent, DetectorSnapshot, Severity, StatsSnapshot};
use colored::{ColoredString, Colorize};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Color a string by severity
fn color_for_severity(severity: Severity, text: &str) -> ColoredString {
    match severity {
        Severity::Low => text.green(),
        Severity::Medium => text.yellow(),
        Severity::High => text.red(),
        Severity::Critical => text.red().bold(),
    }
}

/// Render an event as a severity-colored headline and a detail line
pub fn render_event(event: &AnomalyEvent) -> String {
    let headline = format!(
        "[{}] {}",
        event.severity.as_str().to_uppercase(),
        event.description
    );

    format!(
        "{}\n         Time: {} | Value: {:.2} | Expected: {:.2} | Deviation: {:.1}σ",
        color_for_severity(event.severity, &headline),
        event.detected_at.format(TIMESTAMP_FORMAT),
        event.value,
        event.expected_mean,
        event.deviation_sigma
    )
}

/// Render a block of statistics for one stream, skipped when it has no samples
fn render_stream(out: &mut String, title: &str, stats: &StatsSnapshot, precision: usize, unit: &str) {
    if stats.count == 0 {
        return;
    }

    out.push_str(&format!("\n{}:\n", title.bold()));
    out.push_str(&format!("  Samples: {}\n", stats.count));
    out.push_str(&format!("  Mean: {:.*}{}\n", precision, stats.mean, unit));
    out.push_str(&format!("  StdDev: {:.*}{}\n", precision, stats.stddev, unit));
    out.push_str(&format!(
        "  Min: {:.*}{} | Max: {:.*}{}\n",
        precision, stats.min, unit, precision, stats.max, unit
    ));
}

/// Render a per-process statistics summary
pub fn render_stats(snapshot: &DetectorSnapshot) -> String {
    let mut out = match snapshot.pid {
        Some(pid) => format!("\n=== Anomaly Detector Statistics for PID {} ===\n", pid),
        None => "\n=== Anomaly Detector Statistics ===\n".to_string(),
    };

    render_stream(&mut out, "CPU Statistics", &snapshot.cpu, 2, "%");
    render_stream(&mut out, "Memory Statistics", &snapshot.memory, 0, " KB");
    render_stream(&mut out, "I/O Read Statistics", &snapshot.io_read, 2, " KB/s");
    render_stream(&mut out, "I/O Write Statistics", &snapshot.io_write, 2, " KB/s");

    out
}
