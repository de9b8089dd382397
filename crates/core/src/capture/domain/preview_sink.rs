use crate::photo::photo::Photo;
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

/// Seam to the external preview/display collaborator.
///
/// The shell behind this trait renders images and toggles action
/// availability; the capture logic only emits signals. Decoupling it here
/// keeps the controller testable without any display.
pub trait PreviewSink: Send {
    /// Latest camera frame with its detected face boxes, for live display.
    fn live_frame(&mut self, frame: &Frame, faces: &[FaceBox]);

    /// The stored photo changed: `Some` after capture or background
    /// removal, `None` after retake.
    fn photo_replaced(&mut self, photo: Option<&Photo>);

    /// Whether the capture action is currently permitted.
    fn capture_enabled(&mut self, enabled: bool);

    /// Whether save / remove-background / retake are currently available.
    fn actions_enabled(&mut self, enabled: bool);

    /// Human-readable instruction or status line.
    fn notice(&mut self, message: &str);
}

/// Silent sink that discards all signals.
///
/// Used by tests and by headless runs that only care about results.
pub struct NullPreviewSink;

impl PreviewSink for NullPreviewSink {
    fn live_frame(&mut self, _frame: &Frame, _faces: &[FaceBox]) {}
    fn photo_replaced(&mut self, _photo: Option<&Photo>) {}
    fn capture_enabled(&mut self, _enabled: bool) {}
    fn actions_enabled(&mut self, _enabled: bool) {}
    fn notice(&mut self, _message: &str) {}
}
