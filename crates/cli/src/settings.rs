use facemood_core::emotion::emotion_detector::FallbackPolicy;
use facemood_core::emotion::infrastructure::onnx_expression_model::DEFAULT_FACE_CONFIDENCE;
use facemood_core::shared::constants::{APP_DIR_NAME, SAMPLING_PERIOD_MS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Defaults persisted between runs; command-line flags override them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    pub period_ms: u64,
    pub policy: FallbackPolicy,
    #[serde(default)]
    pub export_dir: Option<PathBuf>,
    #[serde(default = "default_face_confidence")]
    pub face_confidence: f64,
}

fn default_face_confidence() -> f64 {
    DEFAULT_FACE_CONFIDENCE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            period_ms: SAMPLING_PERIOD_MS,
            policy: FallbackPolicy::Synthetic,
            export_dir: None,
            face_confidence: DEFAULT_FACE_CONFIDENCE,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME).join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Missing or unreadable files yield the defaults.
    pub fn load_from(path: &Path) -> Self {
        fs::read_to_string(path)
            .ok()
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            self.save_to(&path);
        }
    }

    pub fn save_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(self) {
            Ok(json) => {
                if let Err(e) = fs::write(path, json) {
                    log::warn!("Could not save settings to {}: {e}", path.display());
                }
            }
            Err(e) => log::warn!("Could not encode settings: {e}"),
        }
    }

    /// Export directory, falling back to the current directory.
    pub fn export_dir_or_cwd(&self) -> PathBuf {
        self.export_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}
