use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// Detection is recomputed per call and never cached; implementations are
/// stateless beyond their immutable model weights. Boxes come back in the
/// order the underlying engine emits them, so callers must treat the
/// first entry as "first/arbitrary", not "best". A malformed or empty
/// frame yields an empty vec: absence of a face is a normal outcome, not
/// an error.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Vec<FaceBox>;
}
