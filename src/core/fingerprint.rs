use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::similarity::SimilarityError;

/// Hex digest of a perceptual fingerprint.
///
/// Stored lowercase so that two digests of the same bits always compare
/// character for character.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hash(String);

impl Hash {
    pub fn parse(value: &str) -> Result<Self, SimilarityError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(SimilarityError::EmptyHash);
        }
        if !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(SimilarityError::NotHex {
                value: trimmed.to_string(),
            });
        }
        Ok(Self(trimmed.to_ascii_lowercase()))
    }

    /// Hex-encode raw hash bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let hex = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Hash {
    type Error = SimilarityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Hash::parse(&value)
    }
}

impl From<Hash> for String {
    fn from(hash: Hash) -> Self {
        hash.0
    }
}

/// The three fingerprints computed from one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageHashSet {
    /// DCT based perceptual hash.
    pub perceptual: Hash,
    /// Row-wise difference hash.
    pub horizontal: Hash,
    /// Column-wise difference hash.
    pub vertical: Hash,
}

impl ImageHashSet {
    pub fn new(perceptual: Hash, horizontal: Hash, vertical: Hash) -> Self {
        Self {
            perceptual,
            horizontal,
            vertical,
        }
    }

    /// Hashes in comparison order: perceptual, horizontal, vertical.
    pub fn as_array(&self) -> [&Hash; 3] {
        [&self.perceptual, &self.horizontal, &self.vertical]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredImageRecord {
    pub id: i64,
    pub hashes: ImageHashSet,
    pub filename: String,
    pub message_id: String,
    /// Normalized OCR transcript, empty when the image carried no text.
    pub ocr_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMatchCandidate {
    pub record: StoredImageRecord,
    /// Mean of the three hash similarities, rounded to a whole percentage.
    pub image_similarity: i64,
    /// Text similarity in percent, or 0 when text was not compared.
    pub text_similarity: f64,
}

/// Frame hashes of one video, in sampling order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoHashSequence(pub Vec<Hash>);

impl VideoHashSequence {
    pub fn new(hashes: Vec<Hash>) -> Self {
        Self(hashes)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Hash> {
        self.0.iter()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

impl From<Vec<Hash>> for VideoHashSequence {
    fn from(hashes: Vec<Hash>) -> Self {
        Self(hashes)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVideoRecord {
    pub id: i64,
    pub filename: String,
    pub sequence: VideoHashSequence,
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMatchCandidate {
    pub record: StoredVideoRecord,
    /// Share of aligned frames that matched, as a whole percentage.
    pub match_fraction: i64,
}

/// Result of a repost lookup. `NoMatch` is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "matches", rename_all = "snake_case")]
pub enum MatchOutcome<T> {
    NoMatch,
    Matches(Vec<T>),
}

impl<T> MatchOutcome<T> {
    /// Wrap a candidate list, mapping an empty list to `NoMatch`.
    pub fn from_candidates(candidates: Vec<T>) -> Self {
        if candidates.is_empty() {
            MatchOutcome::NoMatch
        } else {
            MatchOutcome::Matches(candidates)
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, MatchOutcome::Matches(_))
    }

    pub fn matches(&self) -> &[T] {
        match self {
            MatchOutcome::NoMatch => &[],
            MatchOutcome::Matches(found) => found,
        }
    }

    pub fn into_matches(self) -> Vec<T> {
        match self {
            MatchOutcome::NoMatch => Vec::new(),
            MatchOutcome::Matches(found) => found,
        }
    }
}
