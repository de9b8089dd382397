use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

use crate::capture::domain::frame_source::{DeviceError, FrameSource};
use crate::shared::frame::{Frame, PixelFormat};

/// Webcam frame source backed by the `nokhwa` crate.
///
/// Frames arrive in whatever resolution the driver provides and are
/// decoded to RGB at this boundary. The stream is stopped on drop, so the
/// device is released exactly once regardless of how the session ends.
pub struct NokhwaFrameSource {
    camera: Camera,
    next_index: usize,
}

// Safety: NokhwaFrameSource is only used from a single thread at a time.
// The capture backend's device handles are never shared across threads.
unsafe impl Send for NokhwaFrameSource {}

impl NokhwaFrameSource {
    /// Opens the camera at the given device index and starts its stream.
    pub fn open(index: u32) -> Result<Self, DeviceError> {
        let requested =
            RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| DeviceError(format!("failed to open camera {index}: {e}")))?;
        camera
            .open_stream()
            .map_err(|e| DeviceError(format!("failed to start camera stream: {e}")))?;

        log::info!(
            "Opened camera: {} ({})",
            camera.info().human_name(),
            camera.camera_format()
        );

        Ok(Self {
            camera,
            next_index: 0,
        })
    }

    pub fn resolution(&self) -> (u32, u32) {
        let res = self.camera.resolution();
        (res.width(), res.height())
    }
}

impl FrameSource for NokhwaFrameSource {
    fn next_frame(&mut self) -> Result<Frame, DeviceError> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| DeviceError(format!("failed to pull frame: {e}")))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| DeviceError(format!("failed to decode frame: {e}")))?;

        let (width, height) = (decoded.width(), decoded.height());
        let index = self.next_index;
        self.next_index += 1;
        Ok(Frame::new(
            decoded.into_raw(),
            width,
            height,
            PixelFormat::Rgb,
            index,
        ))
    }
}

impl Drop for NokhwaFrameSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            log::warn!("failed to stop camera stream: {e}");
        }
    }
}
