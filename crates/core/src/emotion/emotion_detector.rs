use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::emotion::domain::emotion::Emotion;
use crate::emotion::domain::expression_model::{ExpressionModel, ModelLoader};
use crate::emotion::domain::prediction::PredictionSet;
use crate::emotion::domain::synthetic_predictions::SyntheticPredictions;
use crate::emotion::infrastructure::placeholder_model::PlaceholderModel;
use crate::shared::frame::Frame;

/// What the detector does when the real model is unavailable or fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// Mask failures with synthetic predictions so output never stops.
    #[default]
    Synthetic,
    /// Surface load and detection failures to the caller.
    Strict,
}

impl std::fmt::Display for FallbackPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FallbackPolicy::Synthetic => write!(f, "synthetic"),
            FallbackPolicy::Strict => write!(f, "strict"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectError {
    #[error("models not loaded yet")]
    NotLoaded,
    #[error("model load failed: {0}")]
    ModelLoadFailure(String),
    #[error("detection failed: {0}")]
    DetectionFailure(String),
}

/// Adapter between the sampling loop and an external expression model.
///
/// `detect` must not be called concurrently; the sampler keeps at most one
/// call in flight.
pub struct EmotionDetector {
    loader: Box<dyn ModelLoader>,
    model: Option<Box<dyn ExpressionModel>>,
    synthetic: SyntheticPredictions,
    policy: FallbackPolicy,
}

impl EmotionDetector {
    pub fn new(loader: Box<dyn ModelLoader>, policy: FallbackPolicy) -> Self {
        Self {
            loader,
            model: None,
            synthetic: SyntheticPredictions::new(),
            policy,
        }
    }

    /// Replaces the synthetic generator (e.g. with a seeded one).
    pub fn with_synthetic(mut self, synthetic: SyntheticPredictions) -> Self {
        self.synthetic = synthetic;
        self
    }

    /// Acquires the model. Under [`FallbackPolicy::Synthetic`] a load failure
    /// installs [`PlaceholderModel`] and still succeeds.
    pub fn load(&mut self) -> Result<(), DetectError> {
        match self.loader.load() {
            Ok(model) => {
                log::info!("Expression model '{}' loaded", model.name());
                self.model = Some(model);
                Ok(())
            }
            Err(e) => match self.policy {
                FallbackPolicy::Synthetic => {
                    log::error!("Error loading models: {e}; using placeholder classifier");
                    self.model = Some(Box::new(PlaceholderModel));
                    Ok(())
                }
                FallbackPolicy::Strict => {
                    log::error!("Error loading models: {e}");
                    self.model = None;
                    Err(DetectError::ModelLoadFailure(e.to_string()))
                }
            },
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn policy(&self) -> FallbackPolicy {
        self.policy
    }

    /// Name of the active model, if loaded.
    pub fn model_name(&self) -> Option<&str> {
        self.model.as_ref().map(|m| m.name())
    }

    pub fn emotion_categories(&self) -> &'static [Emotion] {
        &Emotion::ALL
    }

    /// Ranked predictions for the most prominent face in `frame`.
    ///
    /// Once loaded, only [`FallbackPolicy::Strict`] can make this fail.
    pub fn detect(&mut self, frame: &Frame) -> Result<PredictionSet, DetectError> {
        let model = self.model.as_mut().ok_or(DetectError::NotLoaded)?;
        let now = Utc::now();

        match model.detect_expressions(frame) {
            Ok(Some(scores)) if !scores.is_empty() => Ok(PredictionSet::from_scores(&scores, now)),
            Ok(_) => self.fallback(now, "no face detected".to_string()),
            Err(e) => {
                log::warn!("Error detecting emotions: {e}");
                self.fallback(now, e.to_string())
            }
        }
    }

    fn fallback(
        &mut self,
        now: chrono::DateTime<Utc>,
        reason: String,
    ) -> Result<PredictionSet, DetectError> {
        match self.policy {
            FallbackPolicy::Synthetic => Ok(self.synthetic.generate(now)),
            FallbackPolicy::Strict => Err(DetectError::DetectionFailure(reason)),
        }
    }
}
