use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::photo::photo::Photo;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("no photo to save")]
    NoPhoto,
    #[error("failed to write photo to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Single-slot owner of the in-flight photo.
///
/// Only the capture controller writes here: capture replaces the slot,
/// a successful background removal replaces it again, retake clears it.
#[derive(Default)]
pub struct PhotoStore {
    slot: Option<Photo>,
}

impl PhotoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any prior photo unconditionally.
    pub fn set(&mut self, photo: Photo) {
        self.slot = Some(photo);
    }

    pub fn clear(&mut self) {
        self.slot = None;
    }

    pub fn photo(&self) -> Option<&Photo> {
        self.slot.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    /// Writes the stored photo as lossless PNG.
    ///
    /// An empty slot is a distinct failure from a disk error and touches
    /// nothing on disk.
    pub fn save(&self, path: &Path) -> Result<(), SaveError> {
        let photo = self.slot.as_ref().ok_or(SaveError::NoPhoto)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SaveError::Io {
                path: path.to_path_buf(),
                source: image::ImageError::IoError(e),
            })?;
        }

        photo
            .image()
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| SaveError::Io {
                path: path.to_path_buf(),
                source: e,
            })
    }
}
