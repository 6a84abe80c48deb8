pub mod image_sequence_source;
#[cfg(feature = "webcam")]
pub mod webcam_source;
