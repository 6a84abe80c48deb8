use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::constants::{CAMERA_HEIGHT, CAMERA_WIDTH};
use crate::shared::frame::Frame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    #[default]
    User,
    Environment,
}

/// Capture parameters requested from the platform camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraRequest {
    pub width: u32,
    pub height: u32,
    pub facing: FacingMode,
}

impl Default for CameraRequest {
    fn default() -> Self {
        Self {
            width: CAMERA_WIDTH,
            height: CAMERA_HEIGHT,
            facing: FacingMode::User,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("Failed to access camera. Please check permissions. ({0})")]
    Access(String),
    #[error("camera is not active")]
    NotActive,
    #[error("frame capture failed: {0}")]
    Capture(String),
}

/// A live, camera-like frame provider.
///
/// `start` acquires the underlying device and `stop` releases it; both are
/// idempotent. `current_frame` only succeeds while active.
pub trait VideoSource: Send {
    fn start(&mut self) -> Result<(), CameraError>;

    fn stop(&mut self);

    fn is_active(&self) -> bool;

    fn current_frame(&mut self) -> Result<Frame, CameraError>;

    /// Short human-readable description for logs and status lines.
    fn describe(&self) -> String;
}
