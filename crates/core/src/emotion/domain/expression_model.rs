use super::prediction::ExpressionScores;
use crate::shared::frame::Frame;

/// Domain interface to an external face/expression model.
///
/// Returns the scores of the most prominent face, or `None` when no face is
/// visible. Implementations may keep inference sessions, hence `&mut self`.
pub trait ExpressionModel: Send {
    fn detect_expressions(
        &mut self,
        frame: &Frame,
    ) -> Result<Option<ExpressionScores>, Box<dyn std::error::Error>>;

    /// Short human-readable name for logs.
    fn name(&self) -> &str;
}

/// Acquires an [`ExpressionModel`] (reading weights, building sessions).
pub trait ModelLoader: Send {
    fn load(&self) -> Result<Box<dyn ExpressionModel>, Box<dyn std::error::Error>>;
}
