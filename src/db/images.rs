//! Image rows.

use rusqlite::Row;
use serde::Serialize;

use super::{now_timestamp, Catalog};
use crate::error::Result;

/// Where an image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportSource {
    Local,
    GooglePhotos,
}

impl ImportSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportSource::Local => "local",
            ImportSource::GooglePhotos => "google_photos",
        }
    }

    /// Unknown or missing values in old catalogs are treated as local imports.
    fn from_db(value: Option<&str>) -> Self {
        match value {
            Some("google_photos") => ImportSource::GooglePhotos,
            _ => ImportSource::Local,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Image {
    pub id: i64,
    pub original_path: String,
    /// Relative to the data directory.
    pub stored_path: String,
    /// Relative to the data directory.
    pub thumbnail_path: Option<String>,
    /// Display name without extension.
    pub filename: String,
    /// Leading dot included; may be empty.
    pub extension: String,
    pub imported_at: String,
    pub imported_from: ImportSource,
}

impl Image {
    pub fn display_name(&self) -> String {
        format!("{}{}", self.filename, self.extension)
    }
}

/// Values for a new image row. `id` and `imported_at` are assigned on insert.
#[derive(Debug, Clone)]
pub struct NewImage<'a> {
    pub original_path: &'a str,
    pub stored_path: &'a str,
    pub thumbnail_path: Option<&'a str>,
    pub filename: &'a str,
    pub extension: &'a str,
    pub imported_from: ImportSource,
}

/// Split a filename at its last dot into (name, extension).
///
/// The extension keeps its leading dot. A trailing dot or no dot at all
/// yields an empty extension.
pub fn split_extension(filename: &str) -> (&str, &str) {
    match filename.rfind('.') {
        Some(idx) if idx + 1 < filename.len() => (&filename[..idx], &filename[idx..]),
        _ => (filename, ""),
    }
}

pub(crate) const IMAGE_COLUMNS: &str = "i.id, i.original_path, i.stored_path, i.thumbnail_path, \
     i.filename, i.extension, i.imported_at, i.imported_from";

pub(crate) fn row_to_image(row: &Row) -> rusqlite::Result<Image> {
    let imported_from: Option<String> = row.get(7)?;
    Ok(Image {
        id: row.get(0)?,
        original_path: row.get(1)?,
        stored_path: row.get(2)?,
        thumbnail_path: row.get(3)?,
        filename: row.get(4)?,
        extension: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        imported_at: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        imported_from: ImportSource::from_db(imported_from.as_deref()),
    })
}

impl Catalog {
    pub fn insert_image(&self, image: &NewImage) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO images
                (original_path, stored_path, thumbnail_path, filename, extension, imported_at, imported_from)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            rusqlite::params![
                image.original_path,
                image.stored_path,
                image.thumbnail_path,
                image.filename,
                image.extension,
                now_timestamp(),
                image.imported_from.as_str(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_image(&self, image_id: i64) -> Result<Option<Image>> {
        let conn = self.conn()?;
        let result = conn.query_row(
            &format!("SELECT {} FROM images i WHERE i.id = ?", IMAGE_COLUMNS),
            [image_id],
            row_to_image,
        );
        match result {
            Ok(image) => Ok(Some(image)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Every image, newest import first.
    pub fn get_all_images(&self) -> Result<Vec<Image>> {
        self.query_images(
            &format!(
                "SELECT {} FROM images i ORDER BY i.imported_at DESC, i.id DESC",
                IMAGE_COLUMNS
            ),
            [],
        )
    }

    pub fn count_images(&self) -> Result<i64> {
        let count = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn images_missing_thumbnails(&self) -> Result<Vec<Image>> {
        self.query_images(
            &format!(
                "SELECT {} FROM images i WHERE i.thumbnail_path IS NULL OR i.thumbnail_path = '' \
                 ORDER BY i.imported_at DESC, i.id DESC",
                IMAGE_COLUMNS
            ),
            [],
        )
    }

    pub fn update_image_thumbnail(&self, image_id: i64, thumbnail_path: &str) -> Result<bool> {
        let changed = self.conn()?.execute(
            "UPDATE images SET thumbnail_path = ? WHERE id = ?",
            rusqlite::params![thumbnail_path, image_id],
        )?;
        Ok(changed > 0)
    }

    /// Rename the display name only; the extension is left as is.
    pub fn update_image_filename(&self, image_id: i64, filename: &str) -> Result<bool> {
        let changed = self.conn()?.execute(
            "UPDATE images SET filename = ? WHERE id = ?",
            rusqlite::params![filename, image_id],
        )?;
        Ok(changed > 0)
    }

    /// Delete the row together with its tag and album associations.
    pub fn delete_image(&self, image_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM image_tags WHERE image_id = ?", [image_id])?;
        tx.execute("DELETE FROM album_images WHERE image_id = ?", [image_id])?;
        let changed = tx.execute("DELETE FROM images WHERE id = ?", [image_id])?;
        tx.commit()?;
        Ok(changed > 0)
    }

    pub(crate) fn query_images<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Image>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let images = stmt
            .query_map(params, row_to_image)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(images)
    }
}
