//! Anomaly event export
//!
//! CSV rows carry `timestamp,type,severity,value,expected,deviation_sigma,description`
//! with UTC timestamps and two-decimal numbers. JSON export is an array of
//! serialized events.

use crate::anomaly::AnomalyEvent;
use crate::error::ExportError;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

pub const CSV_HEADER: [&str; 7] = [
    "timestamp",
    "type",
    "severity",
    "value",
    "expected",
    "deviation_sigma",
    "description",
];

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Write events as CSV to any writer
pub fn write_csv<W: Write>(
    writer: W,
    events: &[AnomalyEvent],
    include_header: bool,
) -> Result<(), ExportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    if include_header {
        csv_writer.write_record(CSV_HEADER)?;
    }

    for event in events {
        csv_writer.write_record([
            event.detected_at.format(TIMESTAMP_FORMAT).to_string(),
            event.anomaly_type.to_string(),
            event.severity.to_string(),
            format!("{:.2}", event.value),
            format!("{:.2}", event.expected_mean),
            format!("{:.2}", event.deviation_sigma),
            event.description.clone(),
        ])?;
    }

    csv_writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Export events to a CSV file
///
/// In append mode the header is only written when the file is new or empty.
pub fn export_csv(path: &Path, events: &[AnomalyEvent], append: bool) -> Result<(), ExportError> {
    if events.is_empty() {
        return Err(ExportError::NoEvents);
    }

    let io_err = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .append(append)
        .truncate(!append)
        .open(path)
        .map_err(io_err)?;

    let needs_header = !append || file.metadata().map_err(io_err)?.len() == 0;
    write_csv(file, events, needs_header)
}

/// Serialize events as a JSON array
pub fn to_json(events: &[AnomalyEvent]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(events)?)
}

/// Export events to a JSON file, replacing its contents
pub fn export_json(path: &Path, events: &[AnomalyEvent]) -> Result<(), ExportError> {
    let json = to_json(events)?;
    std::fs::write(path, json).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::{AnomalyType, Severity};
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn events() -> Vec<AnomalyEvent> {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 5).unwrap();
        vec![
            AnomalyEvent {
                anomaly_type: AnomalyType::CpuSpike,
                severity: Severity::Critical,
                value: 95.5,
                expected_mean: 12.25,
                deviation_sigma: 6.0625,
                detected_at: at,
                description: "CPU spike detected: 95.50% (expected 12.25%, 6.1σ deviation)"
                    .to_string(),
            },
            AnomalyEvent {
                anomaly_type: AnomalyType::MemoryLeak,
                severity: Severity::High,
                value: 4_096.0,
                expected_mean: 1_024.0,
                deviation_sigma: 3.0,
                detected_at: at,
                description: "Potential memory leak: growing from 1024 KB to 4096 KB (rate: 60.0 KB/s)"
                    .to_string(),
            },
        ]
    }

    #[test]
    fn test_csv_rows() {
        let mut out = Vec::new();
        write_csv(&mut out, &events(), true).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "timestamp,type,severity,value,expected,deviation_sigma,description"
        );
        assert!(lines[1].starts_with("2024-01-01 12:30:05,cpu-spike,critical,95.50,12.25,6.06,"));
        // descriptions with commas are quoted
        assert!(lines[1].ends_with("\"CPU spike detected: 95.50% (expected 12.25%, 6.1σ deviation)\""));
        assert!(lines[2].contains(",memory-leak,high,4096.00,1024.00,3.00,"));
    }

    #[test]
    fn test_csv_round_trips_through_reader() {
        let mut out = Vec::new();
        write_csv(&mut out, &events(), true).unwrap();

        let mut reader = csv::Reader::from_reader(out.as_slice());
        let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 2);
        assert_eq!(&records[1][6], events()[1].description.as_str());
    }

    #[test]
    fn test_export_csv_append_writes_header_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("anomalies.csv");

        export_csv(&path, &events(), true).unwrap();
        export_csv(&path, &events()[..1], true).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("timestamp,type").count(), 1);
        assert_eq!(text.lines().count(), 4);
    }

    #[test]
    fn test_export_csv_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("anomalies.csv");

        export_csv(&path, &events(), false).unwrap();
        export_csv(&path, &events()[..1], false).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
    }

    #[test]
    fn test_export_csv_rejects_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("anomalies.csv");
        assert!(matches!(export_csv(&path, &[], false), Err(ExportError::NoEvents)));
        assert!(!path.exists());
    }

    #[test]
    fn test_export_csv_bad_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("anomalies.csv");
        assert!(matches!(
            export_csv(&path, &events(), false),
            Err(ExportError::Io { .. })
        ));
    }

    #[test]
    fn test_json_export() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("anomalies.json");
        export_json(&path, &events()).unwrap();

        let parsed: Vec<AnomalyEvent> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, events());

        let value: serde_json::Value = serde_json::from_str(&to_json(&events()).unwrap()).unwrap();
        assert_eq!(value[0]["type"], "cpu-spike");
        assert_eq!(value[1]["severity"], "high");
    }
}
