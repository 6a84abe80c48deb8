use serde::Serialize;

use crate::emotion::domain::prediction::PredictionSet;
use crate::sampling::domain::sampling_state::{EmotionHistory, PerformanceMetrics, SystemStats};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum CameraStatus {
    #[default]
    Inactive,
    Active,
    Failed(String),
}

impl CameraStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, CameraStatus::Active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum ModelStatus {
    #[default]
    Loading,
    /// Carries the active model's name.
    Ready(String),
    Failed(String),
}

impl ModelStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ModelStatus::Ready(_))
    }
}

/// Read-only copy of everything the dashboard shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub predictions: PredictionSet,
    pub history: EmotionHistory,
    pub stats: SystemStats,
    pub metrics: PerformanceMetrics,
    pub camera: CameraStatus,
    pub model: ModelStatus,
    pub sampling_enabled: bool,
    pub ticks_started: u64,
    pub ticks_skipped: u64,
    pub ticks_failed: u64,
}
