use super::{DatabaseError, Repository, VideoStore};
use crate::core::fingerprint::StoredVideoRecord;
use crate::database::models::{NewVideo, VideoRow};
use crate::database::Database;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

const SELECT_VIDEOS: &str = "SELECT id, filename, hashes, message_id, created_at FROM videos";

pub struct VideoRepository {
    db: Database,
}

impl Repository for VideoRepository {
    fn database(&self) -> &Database {
        &self.db
    }
}

impl VideoRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<VideoRow> {
        Ok(VideoRow {
            id: row.get(0)?,
            filename: row.get(1)?,
            hashes: row.get(2)?,
            message_id: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    pub fn create(&self, video: &NewVideo) -> Result<i64, DatabaseError> {
        let hashes = video.sequence.to_json()?;
        let conn = self.get_connection()?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO videos (filename, hashes, message_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![video.filename, hashes, video.message_id, now],
        )?;

        let id = conn.last_insert_rowid();
        log::debug!(
            "Stored video {} ({} frames) as id {}",
            video.filename,
            video.sequence.len(),
            id
        );
        Ok(id)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<StoredVideoRecord>, DatabaseError> {
        let conn = self.get_connection()?;

        let row = conn
            .query_row(
                &format!("{SELECT_VIDEOS} WHERE id = ?1"),
                params![id],
                Self::map_row,
            )
            .optional()?;

        row.map(StoredVideoRecord::try_from).transpose()
    }

    pub fn find_all(&self) -> Result<Vec<StoredVideoRecord>, DatabaseError> {
        let conn = self.get_connection()?;

        let mut stmt = conn.prepare(&format!("{SELECT_VIDEOS} ORDER BY id"))?;
        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(StoredVideoRecord::try_from).collect()
    }

    pub fn count(&self) -> Result<i64, DatabaseError> {
        let conn = self.get_connection()?;

        conn.query_row("SELECT COUNT(*) FROM videos", [], |row| row.get(0))
            .map_err(DatabaseError::Query)
    }
}

impl VideoStore for VideoRepository {
    fn insert_video(&self, video: &NewVideo) -> Result<i64, DatabaseError> {
        self.create(video)
    }

    fn all_videos(&self) -> Result<Vec<StoredVideoRecord>, DatabaseError> {
        self.find_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::{Hash, VideoHashSequence};

    fn setup_repo() -> VideoRepository {
        VideoRepository::new(Database::open_in_memory().unwrap())
    }

    fn new_video(name: &str, frames: usize) -> NewVideo {
        NewVideo {
            filename: name.to_string(),
            sequence: VideoHashSequence::new(
                (0..frames).map(|i| Hash::from_bytes(&[i as u8; 32])).collect(),
            ),
            message_id: format!("msg-{}", name),
        }
    }

    #[test]
    fn test_create_video_round_trips_sequence() {
        let repo = setup_repo();
        let video = new_video("clip.mp4", 20);

        let id = repo.create(&video).unwrap();
        let stored = repo.find_by_id(id).unwrap().unwrap();

        assert_eq!(stored.filename, "clip.mp4");
        assert_eq!(stored.message_id, "msg-clip.mp4");
        assert_eq!(stored.sequence, video.sequence);
    }

    #[test]
    fn test_hashes_column_is_json() {
        let repo = setup_repo();
        let id = repo.create(&new_video("clip.mp4", 2)).unwrap();

        let conn = repo.get_connection().unwrap();
        let raw: String = conn
            .query_row("SELECT hashes FROM videos WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .unwrap();
        let decoded: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[1], "01".repeat(32));
    }

    #[test]
    fn test_all_videos_keeps_short_sequences() {
        let repo = setup_repo();
        repo.insert_video(&new_video("full.mp4", 20)).unwrap();
        repo.insert_video(&new_video("dropped.mp4", 17)).unwrap();

        let all = repo.all_videos().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].sequence.len(), 17);
        assert_eq!(repo.count().unwrap(), 2);
    }

    #[test]
    fn test_legacy_python_list_is_rejected() {
        let repo = setup_repo();
        {
            let conn = repo.get_connection().unwrap();
            conn.execute(
                "INSERT INTO videos (filename, hashes, message_id, created_at)
                 VALUES ('old.mp4', '[''00ff'', ''11ee'']', '1', '')",
                [],
            )
            .unwrap();
        }

        assert!(matches!(
            repo.find_all(),
            Err(DatabaseError::Corrupt { table: "videos", .. })
        ));
    }
}
