use crate::core::fingerprint::{
    Hash, ImageHashSet, StoredImageRecord, StoredVideoRecord, VideoHashSequence,
};
use serde::{Deserialize, Serialize};

use super::DatabaseError;

// Image models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRow {
    pub id: i64,
    pub phash: String,
    pub dhash: String,
    pub dhash_v: String,
    pub filename: String,
    pub message_id: String,
    pub ocr_text: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewImage {
    pub hashes: ImageHashSet,
    pub filename: String,
    pub message_id: String,
    pub ocr_text: String,
}

// Video models
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoRow {
    pub id: i64,
    pub filename: String,
    pub hashes: String, // JSON array
    pub message_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewVideo {
    pub filename: String,
    pub sequence: VideoHashSequence,
    pub message_id: String,
}

fn parse_column(table: &'static str, id: i64, value: &str) -> Result<Hash, DatabaseError> {
    Hash::parse(value).map_err(|e| DatabaseError::Corrupt {
        table,
        id,
        message: e.to_string(),
    })
}

impl TryFrom<ImageRow> for StoredImageRecord {
    type Error = DatabaseError;

    fn try_from(row: ImageRow) -> Result<Self, Self::Error> {
        let hashes = ImageHashSet::new(
            parse_column("images", row.id, &row.phash)?,
            parse_column("images", row.id, &row.dhash)?,
            parse_column("images", row.id, &row.dhash_v)?,
        );

        Ok(StoredImageRecord {
            id: row.id,
            hashes,
            filename: row.filename,
            message_id: row.message_id,
            ocr_text: row.ocr_text,
        })
    }
}

impl TryFrom<VideoRow> for StoredVideoRecord {
    type Error = DatabaseError;

    fn try_from(row: VideoRow) -> Result<Self, Self::Error> {
        let sequence =
            VideoHashSequence::from_json(&row.hashes).map_err(|e| DatabaseError::Corrupt {
                table: "videos",
                id: row.id,
                message: e.to_string(),
            })?;

        Ok(StoredVideoRecord {
            id: row.id,
            filename: row.filename,
            sequence,
            message_id: row.message_id,
        })
    }
}
