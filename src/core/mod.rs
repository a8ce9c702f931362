pub mod fingerprint;
pub mod image_match;
pub mod ranking;
pub mod similarity;
pub mod video_match;

pub use fingerprint::{
    Hash, ImageHashSet, ImageMatchCandidate, MatchOutcome, StoredImageRecord, StoredVideoRecord,
    VideoHashSequence, VideoMatchCandidate,
};
pub use image_match::{
    compare_image_hash_sets, find_repost_candidates, normalize_ocr_text, ImageComparison,
};
pub use ranking::sort_descending;
pub use similarity::{hash_similarity, text_similarity, SimilarityError};
pub use video_match::{find_similar_videos, find_similar_videos_ranked, VideoMatchPolicy};
