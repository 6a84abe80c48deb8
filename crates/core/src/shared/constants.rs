pub const FACE_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const FACE_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EXPRESSION_MODEL_NAME: &str = "emotion-ferplus-8.onnx";
pub const EXPRESSION_MODEL_URL: &str =
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/emotion_ferplus/model/emotion-ferplus-8.onnx";

/// Wall-clock spacing between sampling ticks.
pub const SAMPLING_PERIOD_MS: u64 = 200;

/// Latency floor used by the fps estimate (caps it at ~30 fps).
pub const MIN_FRAME_MS: f64 = 33.0;

pub const CAMERA_WIDTH: u32 = 640;
pub const CAMERA_HEIGHT: u32 = 480;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Name of the application directory under the platform cache/config dirs.
pub const APP_DIR_NAME: &str = "FaceMood";

pub const EXPORT_FILE_PREFIX: &str = "emotion-detection";
