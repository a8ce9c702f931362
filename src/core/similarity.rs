//! Percentage scores for hash and text distances.
//!
//! Both curves are fixed linear penalties rather than normalized ratios:
//! every differing hash character costs [`SIMILARITY_SCALE`]/100 points and
//! every text edit costs `max_len`/[`TEXT_SCALE`] points. Scores are not
//! clamped, so very dissimilar inputs can go below zero.

use thiserror::Error;

use crate::core::fingerprint::Hash;

/// Distance at which a hash comparison has lost 64 points. Applied to every
/// hash regardless of its bit length.
pub const SIMILARITY_SCALE: f64 = 64.0;

/// Divisor applied to the longer text length when weighting edits.
pub const TEXT_SCALE: f64 = 100.0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimilarityError {
    #[error("Hash length mismatch: {left} vs {right} characters")]
    LengthMismatch { left: usize, right: usize },

    #[error("Hash is empty")]
    EmptyHash,

    #[error("Hash is not hexadecimal: {value}")]
    NotHex { value: String },
}

/// Number of aligned positions at which the two digests differ.
pub fn hamming_distance(a: &Hash, b: &Hash) -> Result<usize, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::LengthMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    Ok(a.as_str()
        .bytes()
        .zip(b.as_str().bytes())
        .filter(|(x, y)| x != y)
        .count())
}

/// Similarity of two equal-format hashes, in percent with two decimals.
pub fn hash_similarity(a: &Hash, b: &Hash) -> Result<f64, SimilarityError> {
    let distance = hamming_distance(a, b)? as f64;
    Ok(round_to(100.0 - (SIMILARITY_SCALE / 100.0) * distance, 2))
}

/// Similarity of two OCR transcripts, in percent with two decimals.
/// A missing transcript compares as the empty string.
pub fn text_similarity(a: Option<&str>, b: Option<&str>) -> f64 {
    let a = a.unwrap_or("");
    let b = b.unwrap_or("");

    let max_len = a.chars().count().max(b.chars().count()) as f64;
    let distance = levenshtein(a, b) as f64;

    round_to(100.0 - (max_len / TEXT_SCALE) * distance, 2)
}

/// Minimum number of single-character inserts, deletes and substitutions
/// turning `a` into `b`.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Round half to even at `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round_ties_even() / factor
}

/// Round half to even to a whole number.
pub fn round_whole(value: f64) -> i64 {
    value.round_ties_even() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(s: &str) -> Hash {
        Hash::parse(s).unwrap()
    }

    /// 64 character digest with the first `n` characters flipped.
    fn flipped(n: usize) -> Hash {
        let s: String = (0..64).map(|i| if i < n { 'f' } else { '0' }).collect();
        hash(&s)
    }

    #[test]
    fn test_identical_hashes_score_100() {
        let h = hash("8f3a00ff12c4e9b7");
        assert_eq!(hash_similarity(&h, &h).unwrap(), 100.0);
    }

    #[test]
    fn test_hash_similarity_linear_curve() {
        assert_eq!(hash_similarity(&flipped(0), &flipped(1)).unwrap(), 99.36);
        assert_eq!(hash_similarity(&flipped(0), &flipped(10)).unwrap(), 93.6);
        assert_eq!(hash_similarity(&flipped(0), &flipped(64)).unwrap(), 59.04);
    }

    #[test]
    fn test_hash_similarity_is_symmetric() {
        let a = hash("0123456789abcdef");
        let b = hash("0123456789abcdff");
        assert_eq!(
            hash_similarity(&a, &b).unwrap(),
            hash_similarity(&b, &a).unwrap()
        );
    }

    #[test]
    fn test_hash_similarity_strictly_decreasing() {
        let base = flipped(0);
        let mut last = f64::INFINITY;
        for d in 0..=64 {
            let score = hash_similarity(&base, &flipped(d)).unwrap();
            assert!(score < last, "distance {} scored {}", d, score);
            last = score;
        }
    }

    #[test]
    fn test_hash_similarity_goes_negative_without_clamping() {
        let a = hash(&"0".repeat(256));
        let b = hash(&"f".repeat(256));
        assert_eq!(hash_similarity(&a, &b).unwrap(), -63.84);
    }

    #[test]
    fn test_hash_length_mismatch_fails_fast() {
        let err = hash_similarity(&hash("abcd"), &hash("abcdef")).unwrap_err();
        assert_eq!(err, SimilarityError::LengthMismatch { left: 4, right: 6 });
    }

    #[test]
    fn test_text_similarity_missing_inputs() {
        assert_eq!(text_similarity(None, None), 100.0);
        assert_eq!(text_similarity(Some(""), None), 100.0);
        // "abc" vs nothing: 3 edits weighted by 3/100.
        assert_eq!(text_similarity(Some("abc"), None), 99.91);
    }

    #[test]
    fn test_text_similarity_weights_edits_by_length() {
        // kitten -> sitting: 3 edits, longest text is 7 characters.
        assert_eq!(text_similarity(Some("kitten"), Some("sitting")), 99.79);

        let long_a = "a".repeat(200);
        let long_b = "b".repeat(200);
        // 200 edits at 2 points each.
        assert_eq!(text_similarity(Some(&long_a), Some(&long_b)), -300.0);
    }

    #[test]
    fn test_levenshtein() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("flaw", "lawn"), 2);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("héllo", "hello"), 1);
    }

    #[test]
    fn test_rounding_is_half_even() {
        assert_eq!(round_whole(80.5), 80);
        assert_eq!(round_whole(81.5), 82);
        assert_eq!(round_whole(79.6), 80);
        assert_eq!(round_to(99.364, 2), 99.36);
    }
}
