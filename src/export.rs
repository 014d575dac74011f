//! Session reports for export.
//!
//! A [`SessionReport`] is built from one [`EngineSnapshot`], so every figure in
//! it comes from the same instant. Rates are written exactly as the engine
//! reports them.

use crate::core::engine::EngineSnapshot;
use crate::core::history::HistorySample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use uuid::Uuid;

/// Output format for a session report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

/// Export errors.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Unknown export format: {0:?} (expected json or csv)")]
    UnknownFormat(String),
}

/// One history point in a report.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub rate: f64,
}

impl From<HistorySample> for HistoryEntry {
    fn from(sample: HistorySample) -> Self {
        Self {
            timestamp: sample.timestamp,
            rate: sample.rate,
        }
    }
}

/// Everything known about a session at export time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub report_id: Uuid,
    /// First event of the session, or the export time if nothing was recorded
    pub session_start: DateTime<Utc>,
    pub exported_at: DateTime<Utc>,
    pub session_duration_secs: f64,
    pub total_events: u64,
    pub keyboard_events: u64,
    pub mouse_events: u64,
    pub peak_rate: u32,
    pub min_rate: u32,
    pub average_rate: f64,
    pub rate_1min: f64,
    pub rate_5min: f64,
    pub history: Vec<HistoryEntry>,
}

impl SessionReport {
    /// Build a report from an engine snapshot.
    pub fn from_snapshot(snapshot: &EngineSnapshot) -> Self {
        Self {
            report_id: Uuid::new_v4(),
            session_start: snapshot.session_start.unwrap_or(snapshot.taken_at),
            exported_at: snapshot.taken_at,
            session_duration_secs: snapshot.session_duration.num_milliseconds() as f64 / 1000.0,
            total_events: snapshot.total_events,
            keyboard_events: snapshot.keyboard_events,
            mouse_events: snapshot.mouse_events,
            peak_rate: snapshot.peak_rate,
            min_rate: snapshot.min_rate,
            average_rate: snapshot.average_rate,
            rate_1min: snapshot.rate_1min,
            rate_5min: snapshot.rate_5min,
            history: snapshot.history.iter().copied().map(HistoryEntry::from).collect(),
        }
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Summary block followed by the rate history.
    pub fn to_csv(&self) -> String {
        let mut csv = String::new();

        // Writing into a String cannot fail.
        let _ = writeln!(csv, "key,value");
        let _ = writeln!(csv, "report_id,{}", self.report_id);
        let _ = writeln!(csv, "session_start,{}", self.session_start.to_rfc3339());
        let _ = writeln!(csv, "exported_at,{}", self.exported_at.to_rfc3339());
        let _ = writeln!(csv, "session_duration_secs,{}", self.session_duration_secs);
        let _ = writeln!(csv, "total_events,{}", self.total_events);
        let _ = writeln!(csv, "keyboard_events,{}", self.keyboard_events);
        let _ = writeln!(csv, "mouse_events,{}", self.mouse_events);
        let _ = writeln!(csv, "peak_rate,{}", self.peak_rate);
        let _ = writeln!(csv, "min_rate,{}", self.min_rate);
        let _ = writeln!(csv, "average_rate,{}", self.average_rate);
        let _ = writeln!(csv, "rate_1min,{}", self.rate_1min);
        let _ = writeln!(csv, "rate_5min,{}", self.rate_5min);
        csv.push('\n');

        let _ = writeln!(csv, "timestamp,rate");
        for entry in &self.history {
            let _ = writeln!(csv, "{},{}", entry.timestamp.to_rfc3339(), entry.rate);
        }

        csv
    }

    pub fn render(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Json => self.to_json(),
            ExportFormat::Csv => Ok(self.to_csv()),
        }
    }

    /// Write the report into `dir` as `session_<timestamp>.<ext>`.
    pub fn write_to(&self, dir: &Path, format: ExportFormat) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(dir)?;

        let path = dir.join(format!(
            "session_{}.{}",
            self.exported_at.format("%Y%m%d_%H%M%S"),
            format.extension()
        ));
        std::fs::write(&path, self.render(format)?)?;

        tracing::info!(path = %path.display(), "exported session report");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot() -> EngineSnapshot {
        let start = DateTime::<Utc>::UNIX_EPOCH;
        let taken_at = start + Duration::seconds(90);
        EngineSnapshot {
            taken_at,
            session_start: Some(start),
            session_duration: Duration::seconds(90),
            total_events: 150,
            keyboard_events: 100,
            mouse_events: 50,
            displayed_rate: 98,
            smoothed_rate: 97.6,
            peak_rate: 120,
            min_rate: 45,
            average_rate: 100.0,
            rate_1min: 101.25,
            rate_5min: 88.5,
            history: vec![
                HistorySample {
                    timestamp: start + Duration::seconds(80),
                    rate: 95.123456789,
                },
                HistorySample {
                    timestamp: start + Duration::seconds(85),
                    rate: 97.5,
                },
            ],
        }
    }

    #[test]
    fn test_report_from_snapshot() {
        let report = SessionReport::from_snapshot(&snapshot());
        assert_eq!(report.total_events, 150);
        assert_eq!(report.peak_rate, 120);
        assert_eq!(report.session_duration_secs, 90.0);
        assert_eq!(report.history.len(), 2);
    }

    #[test]
    fn test_empty_session_starts_at_export_time() {
        let mut snap = snapshot();
        snap.session_start = None;
        let report = SessionReport::from_snapshot(&snap);
        assert_eq!(report.session_start, report.exported_at);
    }

    #[test]
    fn test_json_uses_camel_case() {
        let json = SessionReport::from_snapshot(&snapshot()).to_json().unwrap();
        assert!(json.contains("\"totalEvents\": 150"));
        assert!(json.contains("\"rate1min\": 101.25"));
        assert!(json.contains("\"sessionDurationSecs\""));
        assert!(json.contains("\"history\""));

        let parsed: SessionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.history[0].rate, 95.123456789);
    }

    #[test]
    fn test_csv_keeps_full_precision() {
        let csv = SessionReport::from_snapshot(&snapshot()).to_csv();
        assert!(csv.starts_with("key,value\n"));
        assert!(csv.contains("peak_rate,120\n"));
        assert!(csv.contains("rate_1min,101.25\n"));
        assert!(csv.contains("\ntimestamp,rate\n"));
        assert!(csv.contains("1970-01-01T00:01:20+00:00,95.123456789\n"));
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("csv".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert!(matches!(
            "xml".parse::<ExportFormat>(),
            Err(ExportError::UnknownFormat(_))
        ));
    }

    #[test]
    fn test_write_to_directory() {
        let dir = std::env::temp_dir().join(format!("apm-meter-export-{}", std::process::id()));
        let report = SessionReport::from_snapshot(&snapshot());

        let path = report.write_to(&dir, ExportFormat::Csv).unwrap();
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some("session_19700101_000130.csv")
        );
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("total_events,150"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
