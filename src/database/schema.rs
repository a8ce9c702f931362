use rusqlite::Connection;

use super::DatabaseError;

pub const SCHEMA_VERSION: i64 = 1;

const CREATE_IMAGES: &str = "
CREATE TABLE IF NOT EXISTS images (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    phash      TEXT NOT NULL,
    dhash      TEXT NOT NULL,
    dhash_v    TEXT NOT NULL,
    filename   TEXT NOT NULL,
    message_id TEXT NOT NULL,
    ocr_text   TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
)";

// `hashes` holds a JSON array of hex strings.
const CREATE_VIDEOS: &str = "
CREATE TABLE IF NOT EXISTS videos (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    filename   TEXT NOT NULL,
    hashes     TEXT NOT NULL,
    message_id TEXT NOT NULL,
    created_at TEXT NOT NULL
)";

pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(DatabaseError::Migration(format!(
            "Database schema version {} is newer than supported version {}",
            version, SCHEMA_VERSION
        )));
    }

    if version < SCHEMA_VERSION {
        log::info!("Migrating database schema {} -> {}", version, SCHEMA_VERSION);
        conn.execute_batch(&format!(
            "BEGIN;
             {CREATE_IMAGES};
             {CREATE_VIDEOS};
             PRAGMA user_version = {SCHEMA_VERSION};
             COMMIT;"
        ))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('images', 'videos') ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(tables, vec!["images".to_string(), "videos".to_string()]);
    }

    #[test]
    fn test_newer_schema_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA user_version = 99;").unwrap();
        assert!(matches!(
            run_migrations(&conn),
            Err(DatabaseError::Migration(_))
        ));
    }
}
