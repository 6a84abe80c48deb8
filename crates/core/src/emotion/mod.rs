pub mod domain;
pub mod emotion_detector;
pub mod infrastructure;
