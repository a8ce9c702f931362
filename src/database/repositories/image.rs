use super::{DatabaseError, ImageStore, Repository};
use crate::core::fingerprint::StoredImageRecord;
use crate::database::models::{ImageRow, NewImage};
use crate::database::Database;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

const SELECT_IMAGES: &str =
    "SELECT id, phash, dhash, dhash_v, filename, message_id, ocr_text, created_at FROM images";

pub struct ImageRepository {
    db: Database,
}

impl Repository for ImageRepository {
    fn database(&self) -> &Database {
        &self.db
    }
}

impl ImageRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<ImageRow> {
        Ok(ImageRow {
            id: row.get(0)?,
            phash: row.get(1)?,
            dhash: row.get(2)?,
            dhash_v: row.get(3)?,
            filename: row.get(4)?,
            message_id: row.get(5)?,
            ocr_text: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    pub fn create(&self, image: &NewImage) -> Result<i64, DatabaseError> {
        let conn = self.get_connection()?;
        let now = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO images (phash, dhash, dhash_v, filename, message_id, ocr_text, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                image.hashes.perceptual.as_str(),
                image.hashes.horizontal.as_str(),
                image.hashes.vertical.as_str(),
                image.filename,
                image.message_id,
                image.ocr_text,
                now,
            ],
        )?;

        let id = conn.last_insert_rowid();
        log::debug!("Stored image {} as id {}", image.filename, id);
        Ok(id)
    }

    pub fn find_by_id(&self, id: i64) -> Result<Option<StoredImageRecord>, DatabaseError> {
        let conn = self.get_connection()?;

        let row = conn
            .query_row(
                &format!("{SELECT_IMAGES} WHERE id = ?1"),
                params![id],
                Self::map_row,
            )
            .optional()?;

        row.map(StoredImageRecord::try_from).transpose()
    }

    pub fn find_all(&self) -> Result<Vec<StoredImageRecord>, DatabaseError> {
        let conn = self.get_connection()?;

        let mut stmt = conn.prepare(&format!("{SELECT_IMAGES} ORDER BY id"))?;
        let rows = stmt
            .query_map([], Self::map_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(StoredImageRecord::try_from).collect()
    }

    pub fn count(&self) -> Result<i64, DatabaseError> {
        let conn = self.get_connection()?;

        conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))
            .map_err(DatabaseError::Query)
    }
}

impl ImageStore for ImageRepository {
    fn insert_image(&self, image: &NewImage) -> Result<i64, DatabaseError> {
        self.create(image)
    }

    fn all_images(&self) -> Result<Vec<StoredImageRecord>, DatabaseError> {
        self.find_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::{Hash, ImageHashSet};

    fn setup_repo() -> ImageRepository {
        ImageRepository::new(Database::open_in_memory().unwrap())
    }

    fn new_image(name: &str, seed: u8, ocr_text: &str) -> NewImage {
        let hash = Hash::from_bytes(&[seed; 32]);
        NewImage {
            hashes: ImageHashSet::new(hash.clone(), hash.clone(), hash),
            filename: name.to_string(),
            message_id: format!("msg-{}", name),
            ocr_text: ocr_text.to_string(),
        }
    }

    #[test]
    fn test_create_image() {
        let repo = setup_repo();

        let id = repo.create(&new_image("cat.png", 0xab, "caption")).unwrap();
        let stored = repo.find_by_id(id).unwrap().unwrap();

        assert_eq!(stored.id, id);
        assert_eq!(stored.filename, "cat.png");
        assert_eq!(stored.message_id, "msg-cat.png");
        assert_eq!(stored.ocr_text, "caption");
        assert_eq!(stored.hashes.perceptual.len(), 64);
        assert_eq!(stored.hashes.perceptual.as_str(), &"ab".repeat(32));
    }

    #[test]
    fn test_find_missing_image() {
        let repo = setup_repo();
        assert!(repo.find_by_id(42).unwrap().is_none());
    }

    #[test]
    fn test_find_all_in_insert_order() {
        let repo = setup_repo();

        let first = repo.insert_image(&new_image("a.png", 1, "")).unwrap();
        let second = repo.insert_image(&new_image("b.png", 2, "")).unwrap();
        let third = repo.insert_image(&new_image("c.png", 3, "")).unwrap();

        let all = repo.all_images().unwrap();
        let ids: Vec<i64> = all.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first, second, third]);
        assert_eq!(repo.count().unwrap(), 3);
    }

    #[test]
    fn test_corrupt_row_surfaces_as_error() {
        let repo = setup_repo();
        repo.create(&new_image("ok.png", 1, "")).unwrap();
        {
            let conn = repo.get_connection().unwrap();
            conn.execute(
                "INSERT INTO images (phash, dhash, dhash_v, filename, message_id, ocr_text, created_at)
                 VALUES ('zz', 'zz', 'zz', 'bad.png', '1', '', '')",
                [],
            )
            .unwrap();
        }

        assert!(matches!(
            repo.find_all(),
            Err(DatabaseError::Corrupt { table: "images", .. })
        ));
    }
}
