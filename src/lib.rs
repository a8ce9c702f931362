//! Repost detection for images and videos by perceptual fingerprint.
//!
//! [`core`] holds the comparison engine: score functions, the image and
//! video matchers and result ranking. It works on already computed
//! fingerprints and never touches the disk. [`services`] plugs in the
//! hashing, OCR and ffmpeg collaborators, and [`database`] keeps the
//! append-only SQLite collection queries are scanned against.

pub mod config;
pub mod core;
pub mod database;
pub mod services;

pub use crate::config::Settings;
pub use crate::core::{
    compare_image_hash_sets, find_repost_candidates, find_similar_videos,
    find_similar_videos_ranked, hash_similarity, sort_descending, text_similarity, Hash,
    ImageHashSet, ImageMatchCandidate, MatchOutcome, SimilarityError, StoredImageRecord,
    StoredVideoRecord, VideoHashSequence, VideoMatchCandidate,
};
pub use crate::database::{Database, DatabaseError};
pub use crate::services::{FingerprintError, RepostError, RepostService};
