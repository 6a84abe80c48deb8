use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;

use crate::shared::frame::Frame;
use crate::video::domain::video_source::{CameraError, CameraRequest, FacingMode, VideoSource};

/// Frame rate asked of the device; the sampler reads far less often.
const REQUESTED_FPS: u32 = 30;

/// Native webcam capture through `nokhwa`.
///
/// The device is opened on `start` and closed on `stop` or drop.
/// Facing mode has no portable meaning on desktop devices, so it only picks
/// the default index when none is given: `User` is index 0, `Environment`
/// index 1.
pub struct WebcamSource {
    index: u32,
    request: CameraRequest,
    camera: Option<Camera>,
    next_sequence: u64,
}

// Safety: the camera handle is owned by exactly one sampler thread and is
// never shared; nokhwa backends are only !Send because of raw pointers.
unsafe impl Send for WebcamSource {}

impl WebcamSource {
    pub fn new(index: Option<u32>, request: CameraRequest) -> Self {
        let index = index.unwrap_or(match request.facing {
            FacingMode::User => 0,
            FacingMode::Environment => 1,
        });
        Self {
            index,
            request,
            camera: None,
            next_sequence: 0,
        }
    }

    fn open(&self) -> Result<Camera, CameraError> {
        let format = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
            CameraFormat::new(
                Resolution::new(self.request.width, self.request.height),
                FrameFormat::MJPEG,
                REQUESTED_FPS,
            ),
        ));
        let mut camera = Camera::new(CameraIndex::Index(self.index), format)
            .map_err(|e| CameraError::Access(e.to_string()))?;
        camera
            .open_stream()
            .map_err(|e| CameraError::Access(e.to_string()))?;
        Ok(camera)
    }
}

impl VideoSource for WebcamSource {
    fn start(&mut self) -> Result<(), CameraError> {
        if self.camera.is_some() {
            return Ok(());
        }
        let camera = self.open()?;
        let res = camera.resolution();
        log::info!(
            "Camera {} streaming at {}x{}",
            self.index,
            res.width(),
            res.height()
        );
        self.camera = Some(camera);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                log::error!("Error stopping camera stream: {e}");
            }
            log::info!("Camera {} released", self.index);
        }
    }

    fn is_active(&self) -> bool {
        self.camera.is_some()
    }

    fn current_frame(&mut self) -> Result<Frame, CameraError> {
        let camera = self.camera.as_mut().ok_or(CameraError::NotActive)?;
        let buffer = camera
            .frame()
            .map_err(|e| CameraError::Capture(e.to_string()))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| CameraError::Capture(e.to_string()))?;

        let (width, height) = (decoded.width(), decoded.height());
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        Ok(Frame::new(decoded.into_raw(), width, height, 3, sequence))
    }

    fn describe(&self) -> String {
        format!(
            "webcam #{} ({}x{}, {:?})",
            self.index, self.request.width, self.request.height, self.request.facing
        )
    }
}

impl Drop for WebcamSource {
    fn drop(&mut self) {
        self.stop();
    }
}
