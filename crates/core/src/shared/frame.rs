use ndarray::ArrayView3;

/// Channel order of a frame's pixel data.
///
/// Camera drivers differ: some deliver BGR, decode paths here normalize to
/// RGB. The tag travels with the data so conversion happens exactly once,
/// at the I/O boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb,
    Bgr,
}

/// A single camera frame: contiguous 3-channel bytes in row-major order.
///
/// Ephemeral: produced per pull, consumed, never persisted. The domain
/// layer treats pixel data as opaque.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
    index: usize,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat, index: usize) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * 3,
            "data length must equal width * height * 3"
        );
        Self {
            data,
            width,
            height,
            format,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("Frame data length must match dimensions")
    }

    /// Pixel data in RGB order, swapping channels if the frame is BGR.
    pub fn to_rgb_image(&self) -> image::RgbImage {
        let data = match self.format {
            PixelFormat::Rgb => self.data.clone(),
            PixelFormat::Bgr => {
                let mut rgb = self.data.clone();
                for px in rgb.chunks_exact_mut(3) {
                    px.swap(0, 2);
                }
                rgb
            }
        };
        image::RgbImage::from_raw(self.width, self.height, data)
            .expect("Frame data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (self.height as usize, self.width as usize, 3)
    }
}
