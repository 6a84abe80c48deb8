use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::emotion::domain::prediction::PredictionSet;
use crate::sampling::domain::dashboard_snapshot::DashboardSnapshot;
use crate::sampling::domain::sampling_state::{EmotionHistory, PerformanceMetrics};
use crate::shared::constants::EXPORT_FILE_PREFIX;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("failed to encode export: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// One-shot dump of the in-memory dashboard state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub predictions: PredictionSet,
    pub metrics: PerformanceMetrics,
    pub emotion_history: EmotionHistory,
    /// ISO 8601 instant of the export.
    pub timestamp: String,
}

impl ExportRecord {
    pub fn new(
        predictions: PredictionSet,
        metrics: PerformanceMetrics,
        emotion_history: EmotionHistory,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            predictions,
            metrics,
            emotion_history,
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn from_snapshot(snapshot: &DashboardSnapshot, at: DateTime<Utc>) -> Self {
        Self::new(
            snapshot.predictions.clone(),
            snapshot.metrics.clone(),
            snapshot.history.clone(),
            at,
        )
    }

    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// `emotion-detection-<epoch millis>.json`
pub fn export_file_name(at: DateTime<Utc>) -> String {
    format!("{EXPORT_FILE_PREFIX}-{}.json", at.timestamp_millis())
}

/// Writes `record` as pretty JSON into `dir` and returns the file path.
/// The directory is created if missing.
pub fn write_export(
    record: &ExportRecord,
    dir: &Path,
    at: DateTime<Utc>,
) -> Result<PathBuf, ExportError> {
    let json = record.to_json()?;
    let path = dir.join(export_file_name(at));
    let io_err = |source| ExportError::Write {
        path: path.clone(),
        source,
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;
    std::fs::write(&path, json).map_err(io_err)?;
    log::info!("Exported dashboard state to {}", path.display());
    Ok(path)
}

/// Snapshot the state now and write it to `dir`.
pub fn export_snapshot(snapshot: &DashboardSnapshot, dir: &Path) -> Result<PathBuf, ExportError> {
    let now = Utc::now();
    write_export(&ExportRecord::from_snapshot(snapshot, now), dir, now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emotion::domain::emotion::Emotion;
    use crate::emotion::domain::prediction::Prediction;
    use crate::sampling::domain::sampling_loop::SamplingLoop;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn scenario_record(at: DateTime<Utc>) -> ExportRecord {
        let predictions = PredictionSet::new(vec![
            Prediction::new(Emotion::Happy, 0.8, at),
            Prediction::new(Emotion::Neutral, 0.1, at),
        ])
        .unwrap();
        let metrics = PerformanceMetrics {
            total_predictions: 5,
            ..PerformanceMetrics::default()
        };
        let history = EmotionHistory::from_counts([(Emotion::Happy, 3), (Emotion::Sad, 2)]);
        ExportRecord::new(predictions, metrics, history, at)
    }

    #[test]
    fn test_file_name_embeds_epoch_millis() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        assert_eq!(export_file_name(at), "emotion-detection-1700000000123.json");
    }

    #[test]
    fn test_export_scenario_reads_back() {
        let tmp = TempDir::new().unwrap();
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let record = scenario_record(at);

        let path = write_export(&record, tmp.path(), at).unwrap();
        assert!(path.ends_with("emotion-detection-1700000000123.json"));

        let text = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        let object = value.as_object().unwrap();
        let mut keys: Vec<_> = object.keys().map(String::as_str).collect();
        keys.sort();
        assert_eq!(keys, ["emotionHistory", "metrics", "predictions", "timestamp"]);

        assert_eq!(value["predictions"][0]["emotion"], "happy");
        assert_eq!(value["predictions"][0]["timestamp"], 1_700_000_000_123i64);
        assert_eq!(value["metrics"]["accuracy"], 0.89);
        assert_eq!(value["metrics"]["totalPredictions"], 5);
        assert_eq!(value["emotionHistory"]["happy"], 3);
        assert_eq!(value["emotionHistory"]["sad"], 2);

        let ts = value["timestamp"].as_str().unwrap();
        assert_eq!(DateTime::parse_from_rfc3339(ts).unwrap(), at);

        let back: ExportRecord = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_export_is_pretty_printed() {
        let json = scenario_record(Utc::now()).to_json().unwrap();
        assert!(json.contains("\n  \"predictions\""));
    }

    #[test]
    fn test_export_creates_missing_directory() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("nested").join("exports");
        let path = export_snapshot(&SamplingLoop::new().snapshot(), &dir).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_write_failure_names_the_path() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        let err = export_snapshot(&SamplingLoop::new().snapshot(), &blocker).unwrap_err();
        assert!(matches!(err, ExportError::Write { .. }));
        assert!(err.to_string().contains("file"));
    }
}
