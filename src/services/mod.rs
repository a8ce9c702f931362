pub mod ocr;
pub mod perceptual;
pub mod repost;
pub mod video;

pub use ocr::OcrService;
pub use perceptual::PerceptualService;
pub use repost::{RepostError, RepostService};
pub use video::{FfmpegSampler, SampledFrames};

use crate::core::fingerprint::{Hash, ImageHashSet};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Failed to probe video {path}: {message}")]
    Probe { path: String, message: String },

    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },
}

/// Produces hashes and OCR text for image files.
pub trait FingerprintSource: Send + Sync {
    /// Perceptual, horizontal and vertical hashes of one image.
    fn hash_image(&self, path: &Path) -> Result<ImageHashSet, FingerprintError>;

    /// Horizontal difference hash, the variant used for video frames.
    fn hash_frame(&self, path: &Path) -> Result<Hash, FingerprintError>;

    /// Raw OCR transcript of the image.
    fn ocr_text(&self, path: &Path) -> Result<String, FingerprintError>;
}

/// Extracts evenly spaced still frames from a video.
pub trait VideoSampler: Send + Sync {
    /// Sample up to `sample_count` frames. Frames that could not be extracted
    /// are left out; failing to read the video at all is an error.
    fn sample(&self, video: &Path, sample_count: usize) -> Result<SampledFrames, FingerprintError>;
}
