//! SQLite persistence for creative assets and brand rules.
//!
//! A single connection is shared behind a mutex; every repository call
//! locks it for the duration of one statement or transaction.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

pub mod asset_repo;
pub mod error;
pub mod migrations;

pub use asset_repo::{
    AnalysisRecord, AssetFilter, AssetRepository, RequeueOutcome, SqliteAssetRepository,
};
pub use error::DatabaseError;

/// Shared handle to the brandcheck database. Clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens or creates the database file, creating parent directories,
    /// and applies pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        // Workers and the sweep write concurrently; wait instead of failing.
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;",
        )?;
        Self::from_connection(conn, Some(path))
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn, None)
    }

    fn from_connection(conn: Connection, path: Option<&Path>) -> Result<Self, DatabaseError> {
        migrations::run_all(&conn)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        if let Some(path) = path {
            log::info!(
                "Database opened at {} (schema v{})",
                path.display(),
                db.schema_version()?
            );
        }
        Ok(db)
    }

    /// Runs `f` with the connection locked.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }

    /// Highest applied migration version, 0 for an empty database.
    pub fn schema_version(&self) -> Result<u32, DatabaseError> {
        self.with_conn(|conn| {
            let version: Option<u32> =
                conn.query_row("SELECT MAX(version) FROM _migrations", [], |r| r.get(0))?;
            Ok(version.unwrap_or(0))
        })
    }
}

/// `~/.brandcheck/data/brandcheck.db`, used when the config names no path.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".brandcheck").join("data").join("brandcheck.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_is_fully_migrated() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.schema_version().unwrap(), 3);
    }

    #[test]
    fn test_reopen_file_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("brandcheck.db");

        let db = Database::open(&path).unwrap();
        assert!(path.exists());
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO brands (brand_id, brand_name, updated_at) VALUES ('b1', 'Acme', '2026-01-01T00:00:00Z')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        drop(db);

        let reopened = Database::open(&path).unwrap();
        assert_eq!(reopened.schema_version().unwrap(), 3);
        let count: u32 = reopened
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM brands", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_default_database_path() {
        let path = default_database_path().unwrap();
        assert!(path.ends_with(".brandcheck/data/brandcheck.db"));
    }

    #[test]
    fn test_clones_share_connection() {
        let db = Database::open_in_memory().unwrap();
        let other = db.clone();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO brands (brand_id, brand_name, banned_terms, updated_at)
                 VALUES ('b1', 'Acme', '[\"cheap\"]', '2026-01-01T00:00:00Z')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let terms: String = other
            .with_conn(|conn| {
                Ok(conn.query_row(
                    "SELECT banned_terms FROM brands WHERE brand_id = 'b1'",
                    [],
                    |r| r.get(0),
                )?)
            })
            .unwrap();
        assert_eq!(terms, r#"["cheap"]"#);
    }
}
