use std::path::Path;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::constants::{
    DETECT_MIN_FACE_PX, DETECT_SCALE_STEP, DETECT_SCORE_THRESH, DETECT_SLIDE_STEP_PX,
};
use crate::shared::face_box::FaceBox;
use crate::shared::frame::{Frame, PixelFormat};

/// Face detector backed by the `rustface` crate (SeetaFace funnel cascade).
///
/// The model is loaded once; a fresh engine instance is built from it on
/// every call, so the detector itself carries no mutable state. Scan
/// parameters are fixed: 150 px minimum face, 1.1 scale step, 4 px window
/// step, and the engine's calibrated acceptance score.
pub struct SeetaFaceDetector {
    model: rustface::Model,
}

impl SeetaFaceDetector {
    /// Loads the cascade model from a file, typically resolved by
    /// [`crate::shared::model_resolver`].
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let file = std::fs::File::open(model_path)?;
        let model = rustface::read_model(std::io::BufReader::new(file))
            .map_err(|e| format!("failed to read face model: {e}"))?;
        Ok(Self { model })
    }
}

impl FaceDetector for SeetaFaceDetector {
    fn detect(&self, frame: &Frame) -> Vec<FaceBox> {
        if frame.is_empty() {
            return Vec::new();
        }

        let gray = luma_plane(frame);

        let mut detector = rustface::create_detector_with_model(self.model.clone());
        detector.set_min_face_size(DETECT_MIN_FACE_PX);
        detector.set_score_thresh(DETECT_SCORE_THRESH);
        detector.set_pyramid_scale_factor(1.0 / DETECT_SCALE_STEP);
        detector.set_slide_window_step(DETECT_SLIDE_STEP_PX, DETECT_SLIDE_STEP_PX);

        let image = rustface::ImageData::new(&gray, frame.width(), frame.height());
        detector
            .detect(&image)
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceBox {
                    x: bbox.x(),
                    y: bbox.y(),
                    width: bbox.width() as i32,
                    height: bbox.height() as i32,
                }
            })
            .collect()
    }
}

/// BT.601 luma plane of a frame, honoring its channel order.
pub(crate) fn luma_plane(frame: &Frame) -> Vec<u8> {
    let (r_idx, b_idx) = match frame.format() {
        PixelFormat::Rgb => (0usize, 2usize),
        PixelFormat::Bgr => (2, 0),
    };

    let view = frame.as_ndarray();
    let mut gray = Vec::with_capacity((frame.width() * frame.height()) as usize);
    for row in view.outer_iter() {
        for px in row.outer_iter() {
            let r = px[r_idx] as u32;
            let g = px[1] as u32;
            let b = px[b_idx] as u32;
            gray.push(((299 * r + 587 * g + 114 * b) / 1000) as u8);
        }
    }
    gray
}
