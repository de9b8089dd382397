/// Axis-aligned bounding box of a detected face, in frame-pixel coordinates.
///
/// Produced per detection call and consumed immediately; boxes are never
/// retained across frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl FaceBox {
    /// Grows the box by `margin` pixels on each side, clamped to the frame.
    ///
    /// The origin is clamped at zero first, then the expanded extent is
    /// limited to what remains of the frame from the clamped origin. The
    /// result never has negative coordinates and never exceeds the frame.
    pub fn expand_clamped(&self, margin: i32, frame_width: u32, frame_height: u32) -> FaceBox {
        let x = (self.x - margin).max(0);
        let y = (self.y - margin).max(0);
        let width = (self.width + 2 * margin)
            .min(frame_width as i32 - x)
            .max(0);
        let height = (self.height + 2 * margin)
            .min(frame_height as i32 - y)
            .max(0);
        FaceBox {
            x,
            y,
            width,
            height,
        }
    }
}
