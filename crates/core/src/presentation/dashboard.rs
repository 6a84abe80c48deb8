use std::fmt::Write as _;

use crate::emotion::domain::prediction::PredictionSet;
use crate::sampling::domain::dashboard_snapshot::{CameraStatus, DashboardSnapshot, ModelStatus};
use crate::sampling::domain::sampling_state::{EmotionHistory, PerformanceMetrics, SystemStats};

const PANEL_ROWS: usize = 5;
const ROW_BAR_WIDTH: usize = 20;
const CHART_BAR_WIDTH: usize = 40;

/// Camera failure text shown to the user.
pub const CAMERA_FAILURE_MESSAGE: &str = "Failed to access camera. Please check permissions.";

/// `width` cells filled in proportion to `fraction` (clamped to `[0, 1]`).
pub fn bar(fraction: f64, width: usize) -> String {
    let filled = (fraction.clamp(0.0, 1.0) * width as f64).round() as usize;
    format!("{}{}", "#".repeat(filled), ".".repeat(width - filled))
}

/// Processing indicator, top emotion and the five strongest entries.
pub fn render_emotion_panel(predictions: &PredictionSet, is_processing: bool) -> String {
    let mut out = String::from("Emotion Detection\n");
    if is_processing {
        out.push_str("  Processing...\n");
    }
    let Some(top) = predictions.top() else {
        out.push_str("  (no predictions yet)\n");
        return out;
    };

    let _ = writeln!(out, "  {}  {:.1}% confidence", top.emotion, top.percent());
    for p in predictions.iter().take(PANEL_ROWS) {
        let _ = writeln!(
            out,
            "  {:<10} {} {:>3.0}%",
            p.emotion.to_string(),
            bar(f64::from(p.confidence), ROW_BAR_WIDTH),
            p.percent()
        );
    }
    out
}

pub fn render_metrics_panel(metrics: &PerformanceMetrics, stats: &SystemStats) -> String {
    format!(
        "Accuracy {:.1}% ({} predictions) | Latency {:.1}ms | {:.0} FPS | Faces {}\n",
        metrics.accuracy * 100.0,
        metrics.total_predictions,
        stats.latency,
        stats.fps,
        stats.detected_faces
    )
}

/// Horizontal bar chart of the current confidences.
pub fn render_confidence_chart(predictions: &PredictionSet) -> String {
    let mut out = String::from("Current confidences\n");
    for p in predictions {
        let _ = writeln!(
            out,
            "  {:<10} |{}| {:.3}",
            p.emotion.to_string(),
            bar(f64::from(p.confidence), CHART_BAR_WIDTH),
            p.confidence
        );
    }
    out
}

/// Share of ticks per top label, one row per emotion.
pub fn render_history(history: &EmotionHistory) -> String {
    let mut out = format!("Emotion distribution ({} samples)\n", history.total());
    for (emotion, share) in history.distribution() {
        let _ = writeln!(
            out,
            "  {:<10} |{}| {:>5.1}% ({})",
            emotion.to_string(),
            bar(share, CHART_BAR_WIDTH),
            share * 100.0,
            history.count(emotion)
        );
    }
    out
}

pub fn render_status_line(camera: &CameraStatus, model: &ModelStatus) -> String {
    let model = match model {
        ModelStatus::Loading => "Loading...".to_string(),
        ModelStatus::Ready(name) => format!("Loaded ({name})"),
        ModelStatus::Failed(_) => "Failed".to_string(),
    };
    let camera = match camera {
        CameraStatus::Active => "Active".to_string(),
        CameraStatus::Inactive => "Inactive".to_string(),
        CameraStatus::Failed(_) => format!("Inactive | {CAMERA_FAILURE_MESSAGE}"),
    };
    format!("Model: {model} | Camera: {camera}\n")
}

/// Whole dashboard as plain text.
pub fn render(snapshot: &DashboardSnapshot) -> String {
    let mut out = render_status_line(&snapshot.camera, &snapshot.model);
    out.push_str(&render_metrics_panel(&snapshot.metrics, &snapshot.stats));
    out.push('\n');
    out.push_str(&render_emotion_panel(
        &snapshot.predictions,
        snapshot.stats.is_processing,
    ));
    if !snapshot.predictions.is_empty() {
        out.push('\n');
        out.push_str(&render_confidence_chart(&snapshot.predictions));
    }
    out.push('\n');
    out.push_str(&render_history(&snapshot.history));
    out
}
