use std::time::Duration;

use thiserror::Error;

use crate::photo::photo::Photo;

#[derive(Debug, Error)]
pub enum RemovalError {
    #[error("no photo to process")]
    NoPhoto,
    #[error("background removal request failed: {0}")]
    Transport(String),
    #[error("background removal service rejected the API credential")]
    Unauthorized,
    #[error("background removal rate limit exceeded")]
    RateLimited,
    #[error("background removal returned an unreadable payload: {0}")]
    Malformed(String),
    #[error("background removal timed out after {0:?}")]
    Timeout(Duration),
}

/// A single fallible call that produces a background-stripped photo.
///
/// Local models and remote services are interchangeable behind this seam.
/// The input is borrowed and the result is a new photo, so a failed call
/// can never corrupt the caller's stored photo, and retrying with the same
/// input is safe.
pub trait BackgroundRemover: Send {
    fn remove(&self, photo: &Photo) -> Result<Photo, RemovalError>;
}
