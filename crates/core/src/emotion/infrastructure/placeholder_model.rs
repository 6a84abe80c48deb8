use crate::emotion::domain::expression_model::{ExpressionModel, ModelLoader};
use crate::emotion::domain::prediction::ExpressionScores;
use crate::shared::frame::Frame;

/// Stand-in installed when the real model cannot be loaded. It never sees a
/// face, so every call routes through the detector's fallback policy.
pub struct PlaceholderModel;

impl ExpressionModel for PlaceholderModel {
    fn detect_expressions(
        &mut self,
        _frame: &Frame,
    ) -> Result<Option<ExpressionScores>, Box<dyn std::error::Error>> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "placeholder"
    }
}

/// Loader for runs without model files (e.g. offline); every load fails
/// with `reason`, leaving the detector's fallback policy to decide.
pub struct UnavailableModelLoader {
    reason: String,
}

impl UnavailableModelLoader {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

impl ModelLoader for UnavailableModelLoader {
    fn load(&self) -> Result<Box<dyn ExpressionModel>, Box<dyn std::error::Error>> {
        Err(self.reason.clone().into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_reports_a_face() {
        let mut model = PlaceholderModel;
        let frame = Frame::new(vec![0u8; 4 * 4 * 3], 4, 4, 3, 0);
        assert!(model.detect_expressions(&frame).unwrap().is_none());
        assert_eq!(model.name(), "placeholder");
    }

    #[test]
    fn test_unavailable_loader_reports_reason() {
        let loader = UnavailableModelLoader::new("offline mode");
        let err = loader.load().err().unwrap();
        assert_eq!(err.to_string(), "offline mode");
    }
}
