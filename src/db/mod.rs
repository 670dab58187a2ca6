//! Catalog store: images, tags, albums and their associations in SQLite.
//!
//! A [`Catalog`] is an explicit store object. Services borrow it; nothing
//! in the crate holds a global connection. Every mutating statement is
//! committed before the call returns, so the file on disk always reflects
//! the last successful mutation.

mod schema;
pub mod albums;
pub mod images;
pub mod tags;

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};

pub use albums::Album;
pub use images::{split_extension, Image, ImportSource, NewImage};
pub use schema::{COLUMN_MIGRATIONS, SCHEMA};
pub use tags::Tag;

/// Timestamp format used for `imported_at` and `created_at`.
/// Millisecond precision keeps lexical order equal to chronological order.
pub(crate) fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%d %H:%M:%S%.3f")
        .to_string()
}

pub struct Catalog {
    conn: Option<Connection>,
    path: Option<PathBuf>,
}

impl Catalog {
    /// Open (or create) the catalog file, creating its schema and applying
    /// pending column migrations.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        info!("Opened catalog at {:?}", path);
        Self::initialize(conn, Some(path.to_path_buf()))
    }

    /// A throwaway catalog, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::initialize(conn, None)
    }

    fn initialize(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        let catalog = Self {
            conn: Some(conn),
            path,
        };
        catalog.run_migrations()?;
        Ok(catalog)
    }

    /// Release the connection. Any later call fails with a configuration error.
    pub fn close(&mut self) -> Result<()> {
        if let Some(conn) = self.conn.take() {
            conn.close().map_err(|(_, e)| Error::Database(e))?;
            debug!("Catalog closed");
        }
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Backing file, `None` for in-memory catalogs.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub(crate) fn conn(&self) -> Result<&Connection> {
        self.conn
            .as_ref()
            .ok_or_else(|| Error::Config("catalog is not initialized".to_string()))
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        for (column, statement) in COLUMN_MIGRATIONS {
            if column_exists(conn, "images", column)? {
                continue;
            }
            info!("Migrating catalog: adding images.{}", column);
            conn.execute(statement, [])?;
            if *column == "extension" {
                self.backfill_extensions()?;
            }
        }
        Ok(())
    }

    /// Legacy rows stored the full filename; split it into name + extension.
    fn backfill_extensions(&self) -> Result<()> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let rows: Vec<(i64, String)> = {
            let mut stmt = tx.prepare("SELECT id, filename FROM images")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<rusqlite::Result<_>>()?;
            rows
        };
        for (id, filename) in &rows {
            let (name, extension) = split_extension(filename);
            tx.execute(
                "UPDATE images SET filename = ?, extension = ? WHERE id = ?",
                rusqlite::params![name, extension, id],
            )?;
        }
        tx.commit()?;
        info!("Backfilled extensions for {} images", rows.len());
        Ok(())
    }
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(names.iter().any(|name| name == column))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    pub(crate) fn new_image<'a>(stored_path: &'a str, filename: &'a str) -> NewImage<'a> {
        NewImage {
            original_path: "/src/photo.jpg",
            stored_path,
            thumbnail_path: None,
            filename,
            extension: ".jpg",
            imported_from: ImportSource::Local,
        }
    }

    #[test]
    fn test_closed_catalog_reports_configuration_error() {
        let mut catalog = Catalog::open_in_memory().unwrap();
        assert!(catalog.is_open());
        catalog.close().unwrap();
        assert!(!catalog.is_open());

        let err = catalog.get_all_images().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = catalog.insert_tag("beach").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_mutations_survive_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("database.db");

        let mut catalog = Catalog::open(&path).unwrap();
        let image_id = catalog
            .insert_image(&new_image("images/a_1.jpg", "a"))
            .unwrap();
        let tag_id = catalog.insert_tag("beach").unwrap();
        catalog.add_image_tag(image_id, tag_id).unwrap();
        catalog.close().unwrap();

        let catalog = Catalog::open(&path).unwrap();
        assert_eq!(catalog.path(), Some(path.as_path()));
        let image = catalog.get_image(image_id).unwrap().unwrap();
        assert_eq!(image.stored_path, "images/a_1.jpg");
        let tags = catalog.get_image_tags(image_id).unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags[0].name, "beach");
    }

    #[test]
    fn test_legacy_catalog_is_migrated_and_backfilled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("database.db");

        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch(
                r#"
                CREATE TABLE images (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    original_path TEXT NOT NULL,
                    stored_path TEXT NOT NULL,
                    filename TEXT NOT NULL,
                    imported_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                    imported_from TEXT
                );
                INSERT INTO images (original_path, stored_path, filename, imported_from)
                VALUES ('/a/sunset.jpg', 'images/sunset_1.jpg', 'sunset.jpg', 'local');
                INSERT INTO images (original_path, stored_path, filename, imported_from)
                VALUES ('/a/archive', 'images/archive_2', 'archive', 'local');
                INSERT INTO images (original_path, stored_path, filename, imported_from)
                VALUES ('/a/my.trip.png', 'images/my_trip_3.png', 'my.trip.png', 'google_photos');
                "#,
            )
            .unwrap();
        }

        let catalog = Catalog::open(&path).unwrap();
        let conn = catalog.conn().unwrap();
        assert!(column_exists(conn, "images", "thumbnail_path").unwrap());
        assert!(column_exists(conn, "images", "extension").unwrap());

        let sunset = catalog.get_image(1).unwrap().unwrap();
        assert_eq!(sunset.filename, "sunset");
        assert_eq!(sunset.extension, ".jpg");
        assert_eq!(sunset.thumbnail_path, None);

        let archive = catalog.get_image(2).unwrap().unwrap();
        assert_eq!(archive.filename, "archive");
        assert_eq!(archive.extension, "");

        let trip = catalog.get_image(3).unwrap().unwrap();
        assert_eq!(trip.filename, "my.trip");
        assert_eq!(trip.extension, ".png");
        assert_eq!(trip.imported_from, ImportSource::GooglePhotos);
        drop(catalog);

        // A second open finds nothing left to migrate and leaves names alone.
        let catalog = Catalog::open(&path).unwrap();
        let trip = catalog.get_image(3).unwrap().unwrap();
        assert_eq!(trip.filename, "my.trip");
    }
}
