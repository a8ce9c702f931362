//! Repost lookup for videos.
//!
//! A video is fingerprinted as a short sequence of frame hashes taken at
//! evenly spaced timestamps. Two sequences are aligned position by position
//! and the number of closely matching frames decides whether they are the
//! same clip.

use log::{debug, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::fingerprint::{StoredVideoRecord, VideoHashSequence, VideoMatchCandidate};
use crate::core::ranking::sort_descending;
use crate::core::similarity::{hash_similarity, round_whole, SimilarityError};

/// Frames requested from the sampler per video.
pub const VIDEO_SAMPLE_COUNT: usize = 20;

/// Shortest sequence still trusted for alignment. Also the denominator of
/// the match fraction, so one dropped frame out of twenty is tolerated.
pub const VIDEO_MIN_SEQUENCE_LEN: usize = 19;

/// A frame pair counts as matched above this hash similarity.
pub const FRAME_MATCH_THRESHOLD: f64 = 70.0;

/// A video counts as a repost above this match fraction.
pub const VIDEO_MATCH_THRESHOLD: i64 = 35;

/// Gates applied when aligning two frame sequences.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoMatchPolicy {
    pub min_sequence_len: usize,
    pub frame_match_threshold: f64,
    pub match_threshold: i64,
}

impl Default for VideoMatchPolicy {
    fn default() -> Self {
        Self {
            min_sequence_len: VIDEO_MIN_SEQUENCE_LEN,
            frame_match_threshold: FRAME_MATCH_THRESHOLD,
            match_threshold: VIDEO_MATCH_THRESHOLD,
        }
    }
}

impl VideoMatchPolicy {
    /// Match fraction of `candidate` against `query`, or `None` when either
    /// sequence is too short to align.
    pub fn match_fraction(
        &self,
        candidate: &VideoHashSequence,
        query: &VideoHashSequence,
    ) -> Result<Option<i64>, SimilarityError> {
        if candidate.len() < self.min_sequence_len || query.len() < self.min_sequence_len {
            return Ok(None);
        }

        let mut matched_frames = 0usize;
        for (stored, probe) in candidate.iter().zip(query.iter()) {
            if hash_similarity(stored, probe)? > self.frame_match_threshold {
                matched_frames += 1;
            }
        }

        let fraction = (100.0 / self.min_sequence_len as f64) * matched_frames as f64;
        Ok(Some(round_whole(fraction)))
    }

    /// Stored videos whose match fraction beats the policy threshold, in
    /// collection order.
    pub fn find_similar(
        &self,
        query: &VideoHashSequence,
        candidates: &[StoredVideoRecord],
    ) -> Result<Vec<VideoMatchCandidate>, SimilarityError> {
        if query.len() < self.min_sequence_len {
            debug!(
                "query has {} frames, below the {} needed to align",
                query.len(),
                self.min_sequence_len
            );
        }

        let scored = candidates
            .par_iter()
            .map(|record| -> Result<Option<VideoMatchCandidate>, SimilarityError> {
                let Some(fraction) = self.match_fraction(&record.sequence, query)? else {
                    trace!(
                        "video {} skipped: {} stored frames",
                        record.id,
                        record.sequence.len()
                    );
                    return Ok(None);
                };
                trace!("video {} matched {}%", record.id, fraction);

                if fraction > self.match_threshold {
                    Ok(Some(VideoMatchCandidate {
                        record: record.clone(),
                        match_fraction: fraction,
                    }))
                } else {
                    Ok(None)
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        let found: Vec<VideoMatchCandidate> = scored.into_iter().flatten().collect();
        debug!("{} of {} stored videos matched", found.len(), candidates.len());
        Ok(found)
    }
}

/// Find stored videos similar to `query` under the default gates.
///
/// The result is not ordered by score; use [`find_similar_videos_ranked`]
/// when the caller wants the best match first.
pub fn find_similar_videos(
    query: &VideoHashSequence,
    candidates: &[StoredVideoRecord],
) -> Result<Vec<VideoMatchCandidate>, SimilarityError> {
    VideoMatchPolicy::default().find_similar(query, candidates)
}

/// Like [`find_similar_videos`], ordered by match fraction, highest first.
pub fn find_similar_videos_ranked(
    query: &VideoHashSequence,
    candidates: &[StoredVideoRecord],
) -> Result<Vec<VideoMatchCandidate>, SimilarityError> {
    let found = find_similar_videos(query, candidates)?;
    Ok(sort_descending(found, |c| c.match_fraction))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::Hash;
    use std::collections::HashMap;

    fn frame(seed: usize) -> Hash {
        // Distinct but equal-length digests per seed.
        Hash::parse(&format!("{:064x}", seed)).unwrap()
    }

    fn opposite(seed: usize) -> Hash {
        let s: String = format!("{:064x}", seed)
            .chars()
            .map(|c| if c == 'f' { '0' } else { 'f' })
            .collect();
        Hash::parse(&s).unwrap()
    }

    fn sequence(len: usize) -> VideoHashSequence {
        VideoHashSequence::new((0..len).map(frame).collect())
    }

    /// `base` with the first `misses` positions replaced by far-off frames.
    fn degraded(base: &VideoHashSequence, misses: usize) -> VideoHashSequence {
        VideoHashSequence::new(
            base.iter()
                .enumerate()
                .map(|(i, h)| if i < misses { opposite(i) } else { h.clone() })
                .collect(),
        )
    }

    fn stored(id: i64, sequence: VideoHashSequence) -> StoredVideoRecord {
        StoredVideoRecord {
            id,
            filename: format!("clip{}.mp4", id),
            sequence,
            message_id: format!("msg{}", id),
        }
    }

    fn scores(found: &[VideoMatchCandidate]) -> HashMap<i64, i64> {
        found
            .iter()
            .map(|c| (c.record.id, c.match_fraction))
            .collect()
    }

    #[test]
    fn test_short_query_rejected_for_every_candidate() {
        let query = sequence(18);
        let candidates = vec![stored(1, sequence(20)), stored(2, sequence(19))];
        let found = find_similar_videos(&query, &candidates).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_short_candidate_skipped() {
        let query = sequence(20);
        let candidates = vec![stored(1, sequence(18)), stored(2, sequence(20))];
        let found = find_similar_videos(&query, &candidates).unwrap();
        assert_eq!(scores(&found), HashMap::from([(2, 105)]));
    }

    #[test]
    fn test_seventeen_of_nineteen_frames() {
        let query = sequence(19);
        let candidates = vec![stored(1, degraded(&query, 2))];
        let found = find_similar_videos(&query, &candidates).unwrap();
        assert_eq!(scores(&found), HashMap::from([(1, 89)]));
    }

    #[test]
    fn test_one_dropped_frame_aligns_over_shorter_sequence() {
        let query = sequence(20);
        let candidate = VideoHashSequence::new(query.iter().take(19).cloned().collect());
        let found = find_similar_videos(&query, &[stored(7, candidate)]).unwrap();
        assert_eq!(scores(&found), HashMap::from([(7, 100)]));
    }

    #[test]
    fn test_match_threshold_is_strict() {
        let query = sequence(19);
        // 7 matched frames -> 37, 6 matched frames -> 32.
        let candidates = vec![
            stored(1, degraded(&query, 12)),
            stored(2, degraded(&query, 13)),
        ];
        let found = find_similar_videos(&query, &candidates).unwrap();
        assert_eq!(scores(&found), HashMap::from([(1, 37)]));
    }

    #[test]
    fn test_results_cover_every_match() {
        let query = sequence(20);
        let candidates = vec![
            stored(1, degraded(&query, 5)),
            stored(2, degraded(&query, 20)),
            stored(3, query.clone()),
            stored(4, degraded(&query, 10)),
        ];
        let found = find_similar_videos(&query, &candidates).unwrap();
        assert_eq!(
            scores(&found),
            HashMap::from([(1, 79), (3, 105), (4, 53)])
        );
    }

    #[test]
    fn test_ranked_variant_orders_by_fraction() {
        let query = sequence(20);
        let candidates = vec![
            stored(1, degraded(&query, 5)),
            stored(2, query.clone()),
            stored(3, degraded(&query, 10)),
        ];
        let found = find_similar_videos_ranked(&query, &candidates).unwrap();
        let order: Vec<i64> = found.iter().map(|c| c.record.id).collect();
        assert_eq!(order, vec![2, 1, 3]);
    }

    #[test]
    fn test_mismatched_frame_format_fails_fast() {
        let query = sequence(19);
        let mut frames: Vec<Hash> = query.iter().cloned().collect();
        frames[3] = Hash::parse("abc").unwrap();
        let candidates = vec![stored(1, VideoHashSequence::new(frames))];
        let result = find_similar_videos(&query, &candidates);
        assert!(matches!(result, Err(SimilarityError::LengthMismatch { .. })));
    }

    #[test]
    fn test_custom_policy() {
        let policy = VideoMatchPolicy {
            min_sequence_len: 4,
            frame_match_threshold: 70.0,
            match_threshold: 50,
        };
        let query = sequence(4);
        assert_eq!(policy.match_fraction(&query, &query).unwrap(), Some(100));
        assert_eq!(
            policy.match_fraction(&degraded(&query, 2), &query).unwrap(),
            Some(50)
        );
        assert_eq!(policy.match_fraction(&sequence(3), &query).unwrap(), None);

        let found = policy
            .find_similar(&query, &[stored(1, degraded(&query, 2))])
            .unwrap();
        assert!(found.is_empty());
    }
}
