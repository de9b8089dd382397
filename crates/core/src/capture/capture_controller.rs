use std::path::Path;
use std::time::Instant;

use thiserror::Error;

use crate::capture::domain::frame_source::{DeviceError, FrameSource};
use crate::capture::domain::preview_sink::PreviewSink;
use crate::detection::domain::face_detector::FaceDetector;
use crate::gate::liveliness_gate::{GateState, LivelinessGate};
use crate::photo::photo::Photo;
use crate::photo::photo_store::{PhotoStore, SaveError};
use crate::removal::domain::background_remover::{BackgroundRemover, RemovalError};
use crate::shared::constants::{CROP_MARGIN_PX, ICAO_HEIGHT_PX, ICAO_WIDTH_PX, LIVELINESS_PHASE};
use crate::shared::face_box::FaceBox;
use crate::shared::frame::Frame;

pub const PHASE_ONE_NOTICE: &str = "Please move your head up and down for 5 seconds...";
pub const PHASE_TWO_NOTICE: &str = "Great! Now move your head left and right for 5 seconds...";
pub const UNLOCKED_NOTICE: &str = "Liveliness check complete! You may capture your photo.";
pub const FAILED_NOTICE: &str = "Liveliness check failed! Please try again.";
pub const NO_FACE_NOTICE: &str = "No face detected! Please try again.";

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("liveliness gate is not unlocked")]
    GateNotUnlocked,
    #[error("could not pull a frame for capture")]
    FrameUnavailable(#[source] DeviceError),
    #[error("no face detected in the captured frame")]
    NoFaceDetected,
}

/// Orchestrates the capture session: preview ticks feed the liveliness
/// gate, capture-on-demand crops the face to ICAO size, and the photo
/// slot flows through background removal, save, and retake.
///
/// The controller is the only writer of the photo store. Collaborators
/// arrive through the constructor; the display shell sits behind
/// [`PreviewSink`].
pub struct CaptureController {
    source: Box<dyn FrameSource>,
    detector: Box<dyn FaceDetector>,
    sink: Box<dyn PreviewSink>,
    gate: LivelinessGate,
    store: PhotoStore,
}

impl CaptureController {
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn FaceDetector>,
        sink: Box<dyn PreviewSink>,
    ) -> Self {
        Self {
            source,
            detector,
            sink,
            gate: LivelinessGate::new(LIVELINESS_PHASE),
            store: PhotoStore::new(),
        }
    }

    pub fn gate_state(&self) -> GateState {
        self.gate.state()
    }

    pub fn photo(&self) -> Option<&Photo> {
        self.store.photo()
    }

    /// (Re-)arms the liveliness gate and tells the shell capture is locked.
    pub fn start_liveliness(&mut self, now: Instant) {
        self.gate.arm(now);
        self.sink.capture_enabled(false);
        self.sink.notice(PHASE_ONE_NOTICE);
    }

    /// One preview tick: pull a frame, detect, feed the gate, surface any
    /// transition to the shell. A frame-pull failure here means the camera
    /// is gone and the session is over.
    pub fn tick(&mut self, now: Instant) -> Result<GateState, DeviceError> {
        let frame = self.source.next_frame()?;
        let faces = self.detector.detect(&frame);
        self.sink.live_frame(&frame, &faces);

        let before = self.gate.state();
        let state = self.gate.observe(now, !faces.is_empty());
        if state != before {
            match state {
                GateState::AwaitingSecondPresence => self.sink.notice(PHASE_TWO_NOTICE),
                GateState::Unlocked => {
                    self.sink.capture_enabled(true);
                    self.sink.notice(UNLOCKED_NOTICE);
                }
                GateState::Failed => {
                    self.sink.capture_enabled(false);
                    self.sink.notice(FAILED_NOTICE);
                }
                GateState::AwaitingPresence => {}
            }
        }
        Ok(state)
    }

    /// Promotes a fresh frame to the stored photo.
    ///
    /// The gate must be unlocked and the frame itself must contain a
    /// face; a stale unlock does not bypass the live check. A
    /// `NoFaceDetected` failure leaves the gate unlocked so the user can
    /// simply try again.
    pub fn capture(&mut self) -> Result<Photo, CaptureError> {
        if !self.gate.is_unlocked() {
            return Err(CaptureError::GateNotUnlocked);
        }

        let frame = self
            .source
            .next_frame()
            .map_err(CaptureError::FrameUnavailable)?;
        let faces = self.detector.detect(&frame);
        let Some(face) = faces.first() else {
            self.sink.notice(NO_FACE_NOTICE);
            return Err(CaptureError::NoFaceDetected);
        };

        let roi = face.expand_clamped(CROP_MARGIN_PX, frame.width(), frame.height());
        if roi.width <= 0 || roi.height <= 0 {
            return Err(CaptureError::NoFaceDetected);
        }

        let photo = crop_to_photo(&frame, &roi);
        self.store.set(photo.clone());
        self.sink.photo_replaced(Some(&photo));
        self.sink.actions_enabled(true);
        Ok(photo)
    }

    /// Runs the stored photo through background removal.
    ///
    /// On any failure the stored photo is left untouched; retrying with
    /// the same photo is safe.
    pub fn remove_background(
        &mut self,
        remover: &dyn BackgroundRemover,
    ) -> Result<(), RemovalError> {
        let current = self.store.photo().ok_or(RemovalError::NoPhoto)?;
        let replaced = remover.remove(current)?;
        self.store.set(replaced);
        self.sink.photo_replaced(self.store.photo());
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), SaveError> {
        self.store.save(path)
    }

    /// Discards the stored photo and re-arms the full two-phase gate.
    pub fn retake(&mut self, now: Instant) {
        self.store.clear();
        self.sink.photo_replaced(None);
        self.sink.actions_enabled(false);
        self.start_liveliness(now);
    }
}

/// Crops the expanded face region and resizes it to exactly the ICAO
/// target. Non-uniform scaling is accepted.
fn crop_to_photo(frame: &Frame, roi: &FaceBox) -> Photo {
    let rgb = frame.to_rgb_image();
    let cropped = image::imageops::crop_imm(
        &rgb,
        roi.x as u32,
        roi.y as u32,
        roi.width as u32,
        roi.height as u32,
    )
    .to_image();
    let resized = image::imageops::resize(
        &cropped,
        ICAO_WIDTH_PX,
        ICAO_HEIGHT_PX,
        image::imageops::FilterType::Triangle,
    );
    Photo::raw(image::DynamicImage::ImageRgb8(resized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::preview_sink::NullPreviewSink;
    use crate::photo::photo::Provenance;
    use crate::shared::frame::PixelFormat;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    // --- Stubs ---

    struct StubFrameSource {
        width: u32,
        height: u32,
        fail: bool,
        pulls: Arc<Mutex<usize>>,
    }

    impl StubFrameSource {
        fn new(width: u32, height: u32) -> Self {
            Self {
                width,
                height,
                fail: false,
                pulls: Arc::new(Mutex::new(0)),
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(0, 0)
            }
        }
    }

    impl FrameSource for StubFrameSource {
        fn next_frame(&mut self) -> Result<Frame, DeviceError> {
            if self.fail {
                return Err(DeviceError("stub camera disconnected".into()));
            }
            let mut pulls = self.pulls.lock().unwrap();
            let index = *pulls;
            *pulls += 1;
            Ok(Frame::new(
                vec![128; (self.width * self.height * 3) as usize],
                self.width,
                self.height,
                PixelFormat::Rgb,
                index,
            ))
        }
    }

    struct StubDetector {
        boxes: Arc<Mutex<Vec<FaceBox>>>,
    }

    impl StubDetector {
        fn with_face() -> (Self, Arc<Mutex<Vec<FaceBox>>>) {
            let boxes = Arc::new(Mutex::new(vec![FaceBox {
                x: 100,
                y: 100,
                width: 200,
                height: 200,
            }]));
            (
                Self {
                    boxes: boxes.clone(),
                },
                boxes,
            )
        }

        fn empty() -> Self {
            Self {
                boxes: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl FaceDetector for StubDetector {
        fn detect(&self, _frame: &Frame) -> Vec<FaceBox> {
            self.boxes.lock().unwrap().clone()
        }
    }

    struct FailingRemover;

    impl BackgroundRemover for FailingRemover {
        fn remove(&self, _photo: &Photo) -> Result<Photo, RemovalError> {
            Err(RemovalError::Unauthorized)
        }
    }

    struct SolidRemover;

    impl BackgroundRemover for SolidRemover {
        fn remove(&self, _photo: &Photo) -> Result<Photo, RemovalError> {
            // Different dimensions on purpose: the service may not
            // preserve the exact input size
            let img = image::RgbaImage::from_pixel(400, 500, image::Rgba([0, 0, 0, 0]));
            Ok(Photo::background_removed(image::DynamicImage::ImageRgba8(
                img,
            )))
        }
    }

    #[derive(Debug, PartialEq)]
    enum SinkEvent {
        LiveFrame(usize),
        PhotoReplaced(Option<Provenance>),
        CaptureEnabled(bool),
        ActionsEnabled(bool),
        Notice(String),
    }

    struct RecordingSink {
        events: Arc<Mutex<Vec<SinkEvent>>>,
    }

    impl RecordingSink {
        fn new() -> (Self, Arc<Mutex<Vec<SinkEvent>>>) {
            let events = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    events: events.clone(),
                },
                events,
            )
        }
    }

    impl PreviewSink for RecordingSink {
        fn live_frame(&mut self, _frame: &Frame, faces: &[FaceBox]) {
            self.events
                .lock()
                .unwrap()
                .push(SinkEvent::LiveFrame(faces.len()));
        }
        fn photo_replaced(&mut self, photo: Option<&Photo>) {
            self.events
                .lock()
                .unwrap()
                .push(SinkEvent::PhotoReplaced(photo.map(|p| p.provenance())));
        }
        fn capture_enabled(&mut self, enabled: bool) {
            self.events
                .lock()
                .unwrap()
                .push(SinkEvent::CaptureEnabled(enabled));
        }
        fn actions_enabled(&mut self, enabled: bool) {
            self.events
                .lock()
                .unwrap()
                .push(SinkEvent::ActionsEnabled(enabled));
        }
        fn notice(&mut self, message: &str) {
            self.events
                .lock()
                .unwrap()
                .push(SinkEvent::Notice(message.to_string()));
        }
    }

    // --- Helpers ---

    fn controller_with_face() -> (CaptureController, Arc<Mutex<Vec<FaceBox>>>) {
        let (detector, boxes) = StubDetector::with_face();
        let controller = CaptureController::new(
            Box::new(StubFrameSource::new(640, 480)),
            Box::new(detector),
            Box::new(NullPreviewSink),
        );
        (controller, boxes)
    }

    fn unlock(controller: &mut CaptureController, t0: Instant) {
        controller.start_liveliness(t0);
        controller.tick(t0 + Duration::from_secs(1)).unwrap();
        controller.tick(t0 + Duration::from_secs(2)).unwrap();
        assert_eq!(controller.gate_state(), GateState::Unlocked);
    }

    // --- Gate wiring ---

    #[test]
    fn test_ticks_with_faces_unlock_gate() {
        let (mut controller, _boxes) = controller_with_face();
        let t0 = Instant::now();
        controller.start_liveliness(t0);
        assert_eq!(
            controller.tick(t0 + Duration::from_secs(1)).unwrap(),
            GateState::AwaitingSecondPresence
        );
        assert_eq!(
            controller.tick(t0 + Duration::from_secs(2)).unwrap(),
            GateState::Unlocked
        );
    }

    #[test]
    fn test_ticks_without_faces_fail_on_deadline() {
        let mut controller = CaptureController::new(
            Box::new(StubFrameSource::new(640, 480)),
            Box::new(StubDetector::empty()),
            Box::new(NullPreviewSink),
        );
        let t0 = Instant::now();
        controller.start_liveliness(t0);
        controller.tick(t0 + Duration::from_secs(2)).unwrap();
        assert_eq!(
            controller.tick(t0 + Duration::from_secs(5)).unwrap(),
            GateState::Failed
        );
    }

    #[test]
    fn test_tick_device_loss_is_fatal_error() {
        let mut controller = CaptureController::new(
            Box::new(StubFrameSource::failing()),
            Box::new(StubDetector::empty()),
            Box::new(NullPreviewSink),
        );
        controller.start_liveliness(Instant::now());
        assert!(controller.tick(Instant::now()).is_err());
    }

    #[test]
    fn test_tick_signals_sink_on_transitions() {
        let (detector, _boxes) = StubDetector::with_face();
        let (sink, events) = RecordingSink::new();
        let mut controller = CaptureController::new(
            Box::new(StubFrameSource::new(640, 480)),
            Box::new(detector),
            Box::new(sink),
        );
        let t0 = Instant::now();
        controller.start_liveliness(t0);
        controller.tick(t0 + Duration::from_secs(1)).unwrap();
        controller.tick(t0 + Duration::from_secs(2)).unwrap();

        let events = events.lock().unwrap();
        assert!(events.contains(&SinkEvent::CaptureEnabled(false)));
        assert!(events.contains(&SinkEvent::Notice(PHASE_ONE_NOTICE.into())));
        assert!(events.contains(&SinkEvent::Notice(PHASE_TWO_NOTICE.into())));
        assert!(events.contains(&SinkEvent::CaptureEnabled(true)));
        assert!(events.contains(&SinkEvent::Notice(UNLOCKED_NOTICE.into())));
        assert!(events.contains(&SinkEvent::LiveFrame(1)));
    }

    #[test]
    fn test_tick_signals_failure_notice() {
        let (sink, events) = RecordingSink::new();
        let mut controller = CaptureController::new(
            Box::new(StubFrameSource::new(640, 480)),
            Box::new(StubDetector::empty()),
            Box::new(sink),
        );
        let t0 = Instant::now();
        controller.start_liveliness(t0);
        controller.tick(t0 + Duration::from_secs(5)).unwrap();

        let events = events.lock().unwrap();
        assert!(events.contains(&SinkEvent::Notice(FAILED_NOTICE.into())));
        assert_eq!(
            events
                .iter()
                .filter(|e| **e == SinkEvent::CaptureEnabled(false))
                .count(),
            2 // once on arm, once on failure
        );
    }

    // --- Capture preconditions ---

    #[test]
    fn test_capture_before_unlock_is_rejected() {
        let (mut controller, _boxes) = controller_with_face();
        controller.start_liveliness(Instant::now());
        assert!(matches!(
            controller.capture(),
            Err(CaptureError::GateNotUnlocked)
        ));
        assert!(controller.photo().is_none());
    }

    #[test]
    fn test_capture_after_failed_gate_is_rejected() {
        let mut controller = CaptureController::new(
            Box::new(StubFrameSource::new(640, 480)),
            Box::new(StubDetector::empty()),
            Box::new(NullPreviewSink),
        );
        let t0 = Instant::now();
        controller.start_liveliness(t0);
        controller.tick(t0 + Duration::from_secs(5)).unwrap();
        assert!(matches!(
            controller.capture(),
            Err(CaptureError::GateNotUnlocked)
        ));
    }

    #[test]
    fn test_capture_without_face_in_fresh_frame_keeps_gate_unlocked() {
        // Stale unlock must not bypass the live check, and the failure
        // must not cost the user their unlock
        let (mut controller, boxes) = controller_with_face();
        let t0 = Instant::now();
        unlock(&mut controller, t0);

        boxes.lock().unwrap().clear();
        assert!(matches!(
            controller.capture(),
            Err(CaptureError::NoFaceDetected)
        ));
        assert_eq!(controller.gate_state(), GateState::Unlocked);
        assert!(controller.photo().is_none());

        // Face back in view: capture now succeeds without re-running the gate
        boxes.lock().unwrap().push(FaceBox {
            x: 100,
            y: 100,
            width: 200,
            height: 200,
        });
        assert!(controller.capture().is_ok());
    }

    #[test]
    fn test_capture_device_loss_maps_to_frame_unavailable() {
        let (detector, _boxes) = StubDetector::with_face();
        let mut controller = CaptureController::new(
            Box::new(StubFrameSource::new(640, 480)),
            Box::new(detector),
            Box::new(NullPreviewSink),
        );
        let t0 = Instant::now();
        unlock(&mut controller, t0);

        controller.source = Box::new(StubFrameSource::failing());
        assert!(matches!(
            controller.capture(),
            Err(CaptureError::FrameUnavailable(_))
        ));
    }

    // --- Capture result ---

    #[test]
    fn test_capture_produces_icao_photo() {
        let (mut controller, _boxes) = controller_with_face();
        unlock(&mut controller, Instant::now());

        let photo = controller.capture().unwrap();
        assert_eq!(photo.width(), ICAO_WIDTH_PX);
        assert_eq!(photo.height(), ICAO_HEIGHT_PX);
        assert_eq!(photo.provenance(), Provenance::Raw);
        assert_eq!(controller.photo().unwrap().width(), ICAO_WIDTH_PX);
    }

    #[test]
    fn test_capture_resizes_edge_face_to_icao() {
        // Face at the frame corner: margin expansion clamps, crop is not
        // 827x1063-shaped, resize must still hit the exact target
        let (detector, boxes) = StubDetector::with_face();
        *boxes.lock().unwrap() = vec![FaceBox {
            x: 0,
            y: 0,
            width: 160,
            height: 160,
        }];
        let mut controller = CaptureController::new(
            Box::new(StubFrameSource::new(640, 480)),
            Box::new(detector),
            Box::new(NullPreviewSink),
        );
        unlock(&mut controller, Instant::now());

        let photo = controller.capture().unwrap();
        assert_eq!(photo.width(), ICAO_WIDTH_PX);
        assert_eq!(photo.height(), ICAO_HEIGHT_PX);
    }

    #[test]
    fn test_capture_uses_first_box_and_replaces_prior_photo() {
        let (mut controller, boxes) = controller_with_face();
        unlock(&mut controller, Instant::now());
        controller.capture().unwrap();

        // Second capture with a different first box still lands in the slot
        boxes.lock().unwrap().insert(
            0,
            FaceBox {
                x: 200,
                y: 50,
                width: 180,
                height: 180,
            },
        );
        controller.capture().unwrap();
        assert_eq!(controller.photo().unwrap().provenance(), Provenance::Raw);
    }

    #[test]
    fn test_capture_signals_actions_enabled() {
        let (detector, _boxes) = StubDetector::with_face();
        let (sink, events) = RecordingSink::new();
        let mut controller = CaptureController::new(
            Box::new(StubFrameSource::new(640, 480)),
            Box::new(detector),
            Box::new(sink),
        );
        unlock(&mut controller, Instant::now());
        controller.capture().unwrap();

        let events = events.lock().unwrap();
        assert!(events.contains(&SinkEvent::ActionsEnabled(true)));
        assert!(events.contains(&SinkEvent::PhotoReplaced(Some(Provenance::Raw))));
    }

    // --- Background removal ---

    #[test]
    fn test_remove_background_replaces_photo() {
        let (mut controller, _boxes) = controller_with_face();
        unlock(&mut controller, Instant::now());
        controller.capture().unwrap();

        controller.remove_background(&SolidRemover).unwrap();
        let photo = controller.photo().unwrap();
        assert_eq!(photo.provenance(), Provenance::BackgroundRemoved);
        assert_eq!((photo.width(), photo.height()), (400, 500));
    }

    #[test]
    fn test_remove_background_failure_preserves_photo_bytes() {
        let (mut controller, _boxes) = controller_with_face();
        unlock(&mut controller, Instant::now());
        controller.capture().unwrap();
        let before = controller.photo().unwrap().to_png().unwrap();

        let result = controller.remove_background(&FailingRemover);
        assert!(matches!(result, Err(RemovalError::Unauthorized)));

        let after = controller.photo().unwrap().to_png().unwrap();
        assert_eq!(before, after);
        assert_eq!(controller.photo().unwrap().provenance(), Provenance::Raw);
    }

    #[test]
    fn test_remove_background_without_photo_is_no_photo() {
        let (mut controller, _boxes) = controller_with_face();
        assert!(matches!(
            controller.remove_background(&SolidRemover),
            Err(RemovalError::NoPhoto)
        ));
    }

    #[test]
    fn test_remove_background_retry_after_failure_succeeds() {
        let (mut controller, _boxes) = controller_with_face();
        unlock(&mut controller, Instant::now());
        controller.capture().unwrap();

        assert!(controller.remove_background(&FailingRemover).is_err());
        controller.remove_background(&SolidRemover).unwrap();
        assert_eq!(
            controller.photo().unwrap().provenance(),
            Provenance::BackgroundRemoved
        );
    }

    // --- Save / retake ---

    #[test]
    fn test_save_without_photo_is_no_photo() {
        let (controller, _boxes) = controller_with_face();
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            controller.save(&dir.path().join("out.png")),
            Err(SaveError::NoPhoto)
        ));
    }

    #[test]
    fn test_save_writes_captured_photo() {
        let (mut controller, _boxes) = controller_with_face();
        unlock(&mut controller, Instant::now());
        controller.capture().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        controller.save(&path).unwrap();
        let img = image::open(&path).unwrap();
        assert_eq!(img.width(), ICAO_WIDTH_PX);
        assert_eq!(img.height(), ICAO_HEIGHT_PX);
    }

    #[test]
    fn test_retake_clears_photo_and_rearms_gate() {
        let (mut controller, _boxes) = controller_with_face();
        let t0 = Instant::now();
        unlock(&mut controller, t0);
        controller.capture().unwrap();

        controller.retake(t0 + Duration::from_secs(10));
        assert!(controller.photo().is_none());
        assert_eq!(controller.gate_state(), GateState::AwaitingPresence);
    }

    #[test]
    fn test_retake_from_failed_gate_rearms() {
        let mut controller = CaptureController::new(
            Box::new(StubFrameSource::new(640, 480)),
            Box::new(StubDetector::empty()),
            Box::new(NullPreviewSink),
        );
        let t0 = Instant::now();
        controller.start_liveliness(t0);
        controller.tick(t0 + Duration::from_secs(5)).unwrap();
        assert_eq!(controller.gate_state(), GateState::Failed);

        controller.retake(t0 + Duration::from_secs(6));
        assert_eq!(controller.gate_state(), GateState::AwaitingPresence);
    }

    #[test]
    fn test_retake_signals_shell() {
        let (detector, _boxes) = StubDetector::with_face();
        let (sink, events) = RecordingSink::new();
        let mut controller = CaptureController::new(
            Box::new(StubFrameSource::new(640, 480)),
            Box::new(detector),
            Box::new(sink),
        );
        unlock(&mut controller, Instant::now());
        controller.capture().unwrap();
        controller.retake(Instant::now());

        let events = events.lock().unwrap();
        assert!(events.contains(&SinkEvent::PhotoReplaced(None)));
        assert!(events.contains(&SinkEvent::ActionsEnabled(false)));
        // Re-arming repeats the phase-one instruction
        assert_eq!(
            events
                .iter()
                .filter(|e| **e == SinkEvent::Notice(PHASE_ONE_NOTICE.into()))
                .count(),
            2
        );
    }
}
