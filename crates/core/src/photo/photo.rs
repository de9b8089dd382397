use std::io::Cursor;

use image::DynamicImage;

/// Whether a photo is the raw capture or has had its background removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Provenance {
    Raw,
    BackgroundRemoved,
}

/// An owned, decoded photo plus its provenance.
///
/// Raw captures are produced at the ICAO target size. Background-removed
/// photos carry whatever dimensions the removal service returned, and may
/// have an alpha channel. At most one photo exists at a time; the
/// [`crate::photo::photo_store::PhotoStore`] owns the slot.
#[derive(Clone, Debug)]
pub struct Photo {
    image: DynamicImage,
    provenance: Provenance,
}

impl Photo {
    pub fn raw(image: DynamicImage) -> Self {
        Self {
            image,
            provenance: Provenance::Raw,
        }
    }

    pub fn background_removed(image: DynamicImage) -> Self {
        Self {
            image,
            provenance: Provenance::BackgroundRemoved,
        }
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    pub fn provenance(&self) -> Provenance {
        self.provenance
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Lossless serialization, used for both upload and save.
    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let mut buf = Vec::new();
        self.image
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
        Ok(buf)
    }

    pub fn from_png(bytes: &[u8], provenance: Provenance) -> Result<Self, image::ImageError> {
        let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Png)?;
        Ok(Self { image, provenance })
    }
}
