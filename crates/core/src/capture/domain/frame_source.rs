use thiserror::Error;

use crate::shared::frame::Frame;

/// Camera unavailable or disconnected. Fatal to the capture session.
#[derive(Debug, Error)]
#[error("camera device unavailable: {0}")]
pub struct DeviceError(pub String);

/// Supplies raster frames from a camera device on pull.
///
/// The source owns the device exclusively for the session lifetime.
/// Implementations release it exactly once on drop, whichever exit path
/// the session takes.
pub trait FrameSource: Send {
    /// Pulls one fresh frame from the device.
    fn next_frame(&mut self) -> Result<Frame, DeviceError>;
}
