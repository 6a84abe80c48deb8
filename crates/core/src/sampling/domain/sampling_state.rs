use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::emotion::domain::emotion::Emotion;
use crate::shared::constants::MIN_FRAME_MS;

/// How often each emotion was the top prediction. Every label is present,
/// starting at zero; counts never decrease.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmotionHistory(BTreeMap<Emotion, u64>);

impl EmotionHistory {
    pub fn new() -> Self {
        Self(Emotion::ALL.into_iter().map(|e| (e, 0)).collect())
    }

    /// History preloaded with `counts`; labels not mentioned start at zero.
    pub fn from_counts(counts: impl IntoIterator<Item = (Emotion, u64)>) -> Self {
        let mut history = Self::new();
        history.0.extend(counts);
        history
    }

    pub fn record(&mut self, emotion: Emotion) {
        *self.0.entry(emotion).or_insert(0) += 1;
    }

    pub fn count(&self, emotion: Emotion) -> u64 {
        self.0.get(&emotion).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    /// Share of all recorded ticks per label, in `[0, 1]`. All zero when
    /// nothing has been recorded.
    pub fn distribution(&self) -> Vec<(Emotion, f64)> {
        let total = self.total();
        self.0
            .iter()
            .map(|(e, &c)| {
                let share = if total == 0 {
                    0.0
                } else {
                    c as f64 / total as f64
                };
                (*e, share)
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, u64)> + '_ {
        self.0.iter().map(|(e, c)| (*e, *c))
    }
}

impl Default for EmotionHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// Transient per-tick snapshot; overwritten on every completion.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStats {
    pub fps: f64,
    /// Wall time of the last inference call in milliseconds.
    pub latency: f64,
    pub is_processing: bool,
    pub detected_faces: u32,
}

impl SystemStats {
    /// Stats for a call that took `elapsed` and found `faces` faces.
    pub fn completed(elapsed: Duration, faces: u32) -> Self {
        let latency = elapsed.as_secs_f64() * 1000.0;
        Self {
            fps: fps_estimate(latency),
            latency,
            is_processing: false,
            detected_faces: faces,
        }
    }
}

/// `1000 / max(latency_ms, MIN_FRAME_MS)`: never above ~30.3 and always
/// positive for finite latency.
pub fn fps_estimate(latency_ms: f64) -> f64 {
    1000.0 / latency_ms.max(MIN_FRAME_MS)
}

/// Reference quality figures for the expression model plus the running
/// count of ticks that produced predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub accuracy: f64,
    pub precision: BTreeMap<Emotion, f64>,
    pub recall: BTreeMap<Emotion, f64>,
    pub f1_score: BTreeMap<Emotion, f64>,
    pub total_predictions: u64,
}

impl Default for PerformanceMetrics {
    fn default() -> Self {
        use Emotion::{Angry, Happy, Sad};
        Self {
            accuracy: 0.89,
            precision: BTreeMap::from([(Happy, 0.91), (Sad, 0.87), (Angry, 0.85)]),
            recall: BTreeMap::from([(Happy, 0.89), (Sad, 0.88), (Angry, 0.82)]),
            f1_score: BTreeMap::from([(Happy, 0.90), (Sad, 0.87), (Angry, 0.83)]),
            total_predictions: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_history_starts_with_every_label_at_zero() {
        let history = EmotionHistory::new();
        assert_eq!(history.iter().count(), 7);
        assert_eq!(history.total(), 0);
    }

    #[test]
    fn test_history_record_and_count() {
        let mut history = EmotionHistory::new();
        history.record(Emotion::Happy);
        history.record(Emotion::Happy);
        history.record(Emotion::Sad);
        assert_eq!(history.count(Emotion::Happy), 2);
        assert_eq!(history.count(Emotion::Sad), 1);
        assert_eq!(history.count(Emotion::Angry), 0);
        assert_eq!(history.total(), 3);
    }

    #[test]
    fn test_history_distribution() {
        let history = EmotionHistory::from_counts([(Emotion::Happy, 3), (Emotion::Sad, 1)]);
        let dist: BTreeMap<_, _> = history.distribution().into_iter().collect();
        assert_relative_eq!(dist[&Emotion::Happy], 0.75);
        assert_relative_eq!(dist[&Emotion::Sad], 0.25);
        assert_relative_eq!(dist[&Emotion::Neutral], 0.0);
    }

    #[test]
    fn test_empty_history_distribution_is_zero() {
        let history = EmotionHistory::new();
        assert!(history.distribution().iter().all(|(_, s)| *s == 0.0));
    }

    #[test]
    fn test_history_serializes_as_label_map() {
        let history = EmotionHistory::from_counts([(Emotion::Happy, 3), (Emotion::Sad, 2)]);
        let json = serde_json::to_value(&history).unwrap();
        assert_eq!(json["happy"], 3);
        assert_eq!(json["sad"], 2);
        assert_eq!(json["angry"], 0);
    }

    #[rstest]
    #[case(1.0, 1000.0 / 33.0)]
    #[case(33.0, 1000.0 / 33.0)]
    #[case(50.0, 20.0)]
    #[case(200.0, 5.0)]
    #[case(1000.0, 1.0)]
    fn test_fps_estimate(#[case] latency_ms: f64, #[case] expected: f64) {
        assert_relative_eq!(fps_estimate(latency_ms), expected, epsilon = 1e-9);
    }

    #[test]
    fn test_fps_is_bounded_and_positive() {
        for ms in [0.0, 0.5, 10.0, 33.0, 34.0, 250.0, 10_000.0] {
            let fps = fps_estimate(ms);
            assert!(fps > 0.0);
            assert!(fps <= 1000.0 / 33.0 + 1e-9);
        }
    }

    #[test]
    fn test_completed_stats() {
        let stats = SystemStats::completed(Duration::from_millis(100), 1);
        assert_relative_eq!(stats.latency, 100.0, epsilon = 1e-9);
        assert_relative_eq!(stats.fps, 10.0, epsilon = 1e-9);
        assert!(!stats.is_processing);
        assert_eq!(stats.detected_faces, 1);
    }

    #[test]
    fn test_metrics_defaults_and_wire_names() {
        let metrics = PerformanceMetrics::default();
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["accuracy"], 0.89);
        assert_eq!(json["f1Score"]["happy"], 0.9);
        assert_eq!(json["totalPredictions"], 0);
    }
}
