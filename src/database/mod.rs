pub mod models;
pub mod repositories;
pub mod schema;

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

pub type DbConnection<'a> = MutexGuard<'a, Connection>;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database query error: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt row {id} in {table}: {message}")]
    Corrupt {
        table: &'static str,
        id: i64,
        message: String,
    },

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Database connection poisoned")]
    Poisoned,
}

/// Shared handle to the SQLite store. Cloning shares the connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and bring its schema up to date.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        log::debug!("Opened database at {}", path.display());
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        schema::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn connection(&self) -> Result<DbConnection<'_>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::Poisoned)
    }
}

pub fn get_database_path() -> Result<PathBuf, DatabaseError> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| DatabaseError::Migration("Could not find data directory".to_string()))?;

    Ok(data_dir.join("repostr").join("repostr.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_database_connection() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("nested").join("test.db");

        let db = Database::open(&db_path).unwrap();
        let conn = db.connection().unwrap();

        let result: i64 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
        assert_eq!(result, 1);
        assert!(db_path.exists());
    }

    #[test]
    fn test_reopen_keeps_schema() {
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        drop(Database::open(&db_path).unwrap());
        let db = Database::open(&db_path).unwrap();
        let conn = db.connection().unwrap();

        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, schema::SCHEMA_VERSION);
    }

    #[test]
    fn test_database_path_is_under_app_dir() {
        if let Ok(path) = get_database_path() {
            assert!(path.ends_with("repostr/repostr.db"));
        }
    }
}
