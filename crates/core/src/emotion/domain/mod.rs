pub mod emotion;
pub mod expression_model;
pub mod prediction;
pub mod synthetic_predictions;
