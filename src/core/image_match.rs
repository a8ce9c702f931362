//! Repost lookup for still images.
//!
//! A query is scored against every stored record: the three hash
//! similarities are averaged into one whole percentage, which has to beat
//! the image threshold. When a text threshold is set, the OCR transcripts
//! must beat it as well. Survivors are ranked by image similarity.

use log::{debug, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::fingerprint::{ImageHashSet, ImageMatchCandidate, MatchOutcome, StoredImageRecord};
use crate::core::ranking::sort_descending;
use crate::core::similarity::{
    hash_similarity, round_whole, text_similarity, SimilarityError,
};

/// Per-hash similarities of one stored image against a query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageComparison {
    pub perceptual: f64,
    pub horizontal: f64,
    pub vertical: f64,
    /// Rounded mean of the three scores.
    pub total: i64,
}

/// Score the three hash positions of `stored` against `query`.
pub fn compare_image_hash_sets(
    stored: &ImageHashSet,
    query: &ImageHashSet,
) -> Result<ImageComparison, SimilarityError> {
    let perceptual = hash_similarity(&stored.perceptual, &query.perceptual)?;
    let horizontal = hash_similarity(&stored.horizontal, &query.horizontal)?;
    let vertical = hash_similarity(&stored.vertical, &query.vertical)?;

    let total = round_whole((perceptual + horizontal + vertical) / 3.0);

    Ok(ImageComparison {
        perceptual,
        horizontal,
        vertical,
        total,
    })
}

/// Strip spaces, tabs and newlines from an OCR transcript.
pub fn normalize_ocr_text(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, ' ' | '\t' | '\n'))
        .collect()
}

/// Find stored images that look like reposts of `query`.
///
/// `total_threshold` and `text_threshold` are strict lower bounds. A
/// `text_threshold` of zero or less disables the text check entirely and
/// every candidate gets a text score of 0. Mismatched hash formats abort the
/// whole lookup.
pub fn find_repost_candidates(
    query: &ImageHashSet,
    query_text: Option<&str>,
    stored: &[StoredImageRecord],
    total_threshold: f64,
    text_threshold: f64,
) -> Result<MatchOutcome<ImageMatchCandidate>, SimilarityError> {
    let compare_text = text_threshold > 0.0;
    let query_text = if compare_text {
        normalize_ocr_text(query_text.unwrap_or(""))
    } else {
        String::new()
    };

    let scored = stored
        .par_iter()
        .map(|record| -> Result<Option<ImageMatchCandidate>, SimilarityError> {
            let comparison = compare_image_hash_sets(&record.hashes, query)?;
            trace!(
                "image {} scored p={} d={} dv={} total={}",
                record.id,
                comparison.perceptual,
                comparison.horizontal,
                comparison.vertical,
                comparison.total
            );

            if comparison.total as f64 <= total_threshold {
                return Ok(None);
            }

            if !compare_text {
                return Ok(Some(ImageMatchCandidate {
                    record: record.clone(),
                    image_similarity: comparison.total,
                    text_similarity: 0.0,
                }));
            }

            let text_score = text_similarity(Some(&query_text), Some(&record.ocr_text));
            if text_score > text_threshold {
                Ok(Some(ImageMatchCandidate {
                    record: record.clone(),
                    image_similarity: comparison.total,
                    text_similarity: text_score,
                }))
            } else {
                Ok(None)
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    let candidates: Vec<ImageMatchCandidate> = scored.into_iter().flatten().collect();
    debug!(
        "{} of {} stored images passed (image > {}, text > {})",
        candidates.len(),
        stored.len(),
        total_threshold,
        text_threshold
    );

    if candidates.is_empty() {
        return Ok(MatchOutcome::NoMatch);
    }

    Ok(MatchOutcome::Matches(sort_descending(candidates, |c| {
        c.image_similarity
    })))
}
