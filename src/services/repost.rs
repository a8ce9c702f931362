//! Repost checks wired to fingerprinting and storage.
//!
//! Each operation resolves its inputs through the collaborators (hashing,
//! OCR, frame sampling, the stores) and then hands plain data to the
//! matchers in [`crate::core`].

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use super::perceptual::is_image;
use super::{FingerprintError, FingerprintSource, VideoSampler};
use crate::config::{ImageSettings, VideoSettings};
use crate::core::fingerprint::{
    ImageHashSet, ImageMatchCandidate, MatchOutcome, VideoHashSequence, VideoMatchCandidate,
};
use crate::core::image_match::{find_repost_candidates, normalize_ocr_text};
use crate::core::ranking::sort_descending;
use crate::core::similarity::SimilarityError;
use crate::database::models::{NewImage, NewVideo};
use crate::database::repositories::{ImageStore, VideoStore};
use crate::database::DatabaseError;

#[derive(Debug, Error)]
pub enum RepostError {
    #[error("Fingerprint comparison error: {0}")]
    Similarity(#[from] SimilarityError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Fingerprint error: {0}")]
    Fingerprint(#[from] FingerprintError),

    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    #[error("Not an image file: {path}")]
    NotAnImage { path: String },
}

pub struct RepostService {
    fingerprints: Arc<dyn FingerprintSource>,
    sampler: Arc<dyn VideoSampler>,
    images: Arc<dyn ImageStore>,
    videos: Arc<dyn VideoStore>,
    image_settings: ImageSettings,
    video_settings: VideoSettings,
}

impl RepostService {
    pub fn new(
        fingerprints: Arc<dyn FingerprintSource>,
        sampler: Arc<dyn VideoSampler>,
        images: Arc<dyn ImageStore>,
        videos: Arc<dyn VideoStore>,
    ) -> Self {
        Self {
            fingerprints,
            sampler,
            images,
            videos,
            image_settings: ImageSettings::default(),
            video_settings: VideoSettings::default(),
        }
    }

    pub fn with_image_settings(mut self, settings: ImageSettings) -> Self {
        self.image_settings = settings;
        self
    }

    pub fn with_video_settings(mut self, settings: VideoSettings) -> Self {
        self.video_settings = settings;
        self
    }

    pub fn image_settings(&self) -> &ImageSettings {
        &self.image_settings
    }

    fn file_name(path: &Path) -> Result<String, RepostError> {
        path.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| RepostError::InvalidPath {
                path: path.display().to_string(),
            })
    }

    fn image_file_name(path: &Path) -> Result<String, RepostError> {
        let filename = Self::file_name(path)?;
        if !is_image(&filename) {
            return Err(RepostError::NotAnImage {
                path: path.display().to_string(),
            });
        }
        Ok(filename)
    }

    /// Fingerprint an image and store it unconditionally.
    pub fn add_image(&self, path: &Path, message_id: &str) -> Result<i64, RepostError> {
        let filename = Self::image_file_name(path)?;
        let hashes = self.fingerprints.hash_image(path)?;
        let raw_text = self.fingerprints.ocr_text(path)?;

        self.store_image(path, filename, hashes, &raw_text, message_id)
    }

    fn store_image(
        &self,
        path: &Path,
        filename: String,
        hashes: ImageHashSet,
        raw_text: &str,
        message_id: &str,
    ) -> Result<i64, RepostError> {
        let id = self.images.insert_image(&NewImage {
            hashes,
            filename,
            message_id: message_id.to_string(),
            ocr_text: normalize_ocr_text(raw_text),
        })?;
        log::info!("Added image {} as {}", path.display(), id);
        Ok(id)
    }

    /// Look up reposts of an image using the configured thresholds.
    pub fn check_image(&self, path: &Path) -> Result<MatchOutcome<ImageMatchCandidate>, RepostError> {
        self.check_image_with(
            path,
            self.image_settings.total_threshold,
            self.image_settings.text_threshold,
        )
    }

    /// Look up reposts of an image. OCR only runs when `text_threshold` is
    /// positive.
    pub fn check_image_with(
        &self,
        path: &Path,
        total_threshold: f64,
        text_threshold: f64,
    ) -> Result<MatchOutcome<ImageMatchCandidate>, RepostError> {
        Self::image_file_name(path)?;
        let (hashes, text) = self.fingerprint_query(path, text_threshold)?;
        self.scan_images(path, &hashes, text.as_deref(), total_threshold, text_threshold)
    }

    /// Look up reposts of an image and store it when nothing matched.
    /// Hashing and OCR run at most once. Returns the new id when stored.
    pub fn check_and_add_image(
        &self,
        path: &Path,
        message_id: &str,
        total_threshold: f64,
        text_threshold: f64,
    ) -> Result<(MatchOutcome<ImageMatchCandidate>, Option<i64>), RepostError> {
        let filename = Self::image_file_name(path)?;
        let (hashes, text) = self.fingerprint_query(path, text_threshold)?;
        let outcome =
            self.scan_images(path, &hashes, text.as_deref(), total_threshold, text_threshold)?;
        if outcome.is_match() {
            return Ok((outcome, None));
        }

        let raw_text = match text {
            Some(text) => text,
            None => self.fingerprints.ocr_text(path)?,
        };
        let id = self.store_image(path, filename, hashes, &raw_text, message_id)?;
        Ok((outcome, Some(id)))
    }

    fn fingerprint_query(
        &self,
        path: &Path,
        text_threshold: f64,
    ) -> Result<(ImageHashSet, Option<String>), RepostError> {
        let hashes = self.fingerprints.hash_image(path)?;
        let text = if text_threshold > 0.0 {
            Some(self.fingerprints.ocr_text(path)?)
        } else {
            None
        };
        Ok((hashes, text))
    }

    fn scan_images(
        &self,
        path: &Path,
        hashes: &ImageHashSet,
        text: Option<&str>,
        total_threshold: f64,
        text_threshold: f64,
    ) -> Result<MatchOutcome<ImageMatchCandidate>, RepostError> {
        let stored = self.images.all_images()?;
        let outcome =
            find_repost_candidates(hashes, text, &stored, total_threshold, text_threshold)?;

        log::info!(
            "Checked {} against {} images: {} match(es)",
            path.display(),
            stored.len(),
            outcome.matches().len()
        );
        Ok(outcome)
    }

    /// Sample and hash a video's frames. Frames that fail to hash are
    /// dropped like frames that failed to extract.
    pub fn hash_video(&self, path: &Path) -> Result<VideoHashSequence, RepostError> {
        let frames = self.sampler.sample(path, self.video_settings.sample_count)?;

        let mut hashes = Vec::with_capacity(frames.len());
        for frame in frames.paths() {
            match self.fingerprints.hash_frame(frame) {
                Ok(hash) => hashes.push(hash),
                Err(e) => log::warn!("Skipping frame {}: {}", frame.display(), e),
            }
        }

        Ok(VideoHashSequence::new(hashes))
    }

    /// Videos in the store that match `sequence`.
    pub fn match_video(
        &self,
        sequence: &VideoHashSequence,
    ) -> Result<MatchOutcome<VideoMatchCandidate>, RepostError> {
        let stored = self.videos.all_videos()?;
        let mut found = self.video_settings.policy.find_similar(sequence, &stored)?;
        if self.video_settings.ranked {
            found = sort_descending(found, |c| c.match_fraction);
        }

        log::info!(
            "Matched {} frames against {} videos: {} match(es)",
            sequence.len(),
            stored.len(),
            found.len()
        );
        Ok(MatchOutcome::from_candidates(found))
    }

    /// Check a video and store it only if nothing matched.
    pub fn process_video(
        &self,
        path: &Path,
        message_id: &str,
    ) -> Result<MatchOutcome<VideoMatchCandidate>, RepostError> {
        let filename = Self::file_name(path)?;
        let sequence = self.hash_video(path)?;
        let outcome = self.match_video(&sequence)?;

        if !outcome.is_match() {
            let id = self.videos.insert_video(&NewVideo {
                filename,
                sequence,
                message_id: message_id.to_string(),
            })?;
            log::info!("Added video {} as {}", path.display(), id);
        }

        Ok(outcome)
    }

    /// Check a video without storing it.
    pub fn check_video(&self, path: &Path) -> Result<MatchOutcome<VideoMatchCandidate>, RepostError> {
        let sequence = self.hash_video(path)?;
        self.match_video(&sequence)
    }

    /// Store a video without checking it.
    pub fn import_video(&self, path: &Path, message_id: &str) -> Result<i64, RepostError> {
        let filename = Self::file_name(path)?;
        let sequence = self.hash_video(path)?;

        let id = self.videos.insert_video(&NewVideo {
            filename,
            sequence,
            message_id: message_id.to_string(),
        })?;
        log::info!("Imported video {} as {}", path.display(), id);
        Ok(id)
    }
}
