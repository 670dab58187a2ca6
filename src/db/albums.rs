//! Albums and the album/image association.

use serde::Serialize;

use super::images::{Image, IMAGE_COLUMNS};
use super::{now_timestamp, Catalog};
use crate::error::Result;

/// An album (collection of photos)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Album {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

fn row_to_album(row: &rusqlite::Row) -> rusqlite::Result<Album> {
    Ok(Album {
        id: row.get(0)?,
        name: row.get(1)?,
        created_at: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
    })
}

impl Catalog {
    /// Create an album or return the id of the existing one with this name.
    pub fn insert_album(&self, name: &str) -> Result<i64> {
        let id = self.conn()?.query_row(
            r#"
            INSERT INTO albums (name, created_at) VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET name = excluded.name
            RETURNING id
            "#,
            rusqlite::params![name, now_timestamp()],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn get_album(&self, album_id: i64) -> Result<Option<Album>> {
        let result = self.conn()?.query_row(
            "SELECT id, name, created_at FROM albums WHERE id = ?",
            [album_id],
            row_to_album,
        );
        match result {
            Ok(album) => Ok(Some(album)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_all_albums(&self) -> Result<Vec<Album>> {
        self.query_albums("SELECT id, name, created_at FROM albums ORDER BY name", [])
    }

    pub fn get_albums_by_image(&self, image_id: i64) -> Result<Vec<Album>> {
        self.query_albums(
            r#"
            SELECT a.id, a.name, a.created_at
            FROM albums a
            JOIN album_images ai ON ai.album_id = a.id
            WHERE ai.image_id = ?
            ORDER BY a.name
            "#,
            [image_id],
        )
    }

    /// Returns false when the image was already in the album.
    pub fn add_image_to_album(&self, image_id: i64, album_id: i64) -> Result<bool> {
        let changed = self.conn()?.execute(
            "INSERT OR IGNORE INTO album_images (album_id, image_id) VALUES (?, ?)",
            rusqlite::params![album_id, image_id],
        )?;
        Ok(changed > 0)
    }

    pub fn remove_image_from_album(&self, image_id: i64, album_id: i64) -> Result<bool> {
        let changed = self.conn()?.execute(
            "DELETE FROM album_images WHERE image_id = ? AND album_id = ?",
            rusqlite::params![image_id, album_id],
        )?;
        Ok(changed > 0)
    }

    /// Unassign every image from the album. Returns the number of links removed.
    pub fn remove_all_images_from_album(&self, album_id: i64) -> Result<usize> {
        let changed = self
            .conn()?
            .execute("DELETE FROM album_images WHERE album_id = ?", [album_id])?;
        Ok(changed)
    }

    pub fn get_images_by_album(&self, album_id: i64) -> Result<Vec<Image>> {
        self.query_images(
            &format!(
                r#"
                SELECT {}
                FROM images i
                JOIN album_images ai ON ai.image_id = i.id
                WHERE ai.album_id = ?
                ORDER BY i.imported_at DESC, i.id DESC
                "#,
                IMAGE_COLUMNS
            ),
            [album_id],
        )
    }

    /// Images that belong to no album.
    pub fn get_unassigned_images(&self) -> Result<Vec<Image>> {
        self.query_images(
            &format!(
                r#"
                SELECT {}
                FROM images i
                LEFT JOIN album_images ai ON ai.image_id = i.id
                WHERE ai.image_id IS NULL
                ORDER BY i.imported_at DESC, i.id DESC
                "#,
                IMAGE_COLUMNS
            ),
            [],
        )
    }

    /// Delete the album row and its image links. Images are untouched.
    pub fn delete_album(&self, album_id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute("DELETE FROM album_images WHERE album_id = ?", [album_id])?;
        let changed = tx.execute("DELETE FROM albums WHERE id = ?", [album_id])?;
        tx.commit()?;
        Ok(changed > 0)
    }

    fn query_albums<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Album>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let albums = stmt
            .query_map(params, row_to_album)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(albums)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::new_image;

    #[test]
    fn test_insert_album_returns_existing_id() {
        let catalog = Catalog::open_in_memory().unwrap();
        let first = catalog.insert_album("Summer").unwrap();
        let created_at = catalog.get_album(first).unwrap().unwrap().created_at;

        let again = catalog.insert_album("Summer").unwrap();
        assert_eq!(first, again);
        assert_eq!(catalog.get_all_albums().unwrap().len(), 1);
        assert_eq!(catalog.get_album(first).unwrap().unwrap().created_at, created_at);
    }

    #[test]
    fn test_membership_and_unassigned() {
        let catalog = Catalog::open_in_memory().unwrap();
        let a = catalog.insert_image(&new_image("images/a.jpg", "a")).unwrap();
        let b = catalog.insert_image(&new_image("images/b.jpg", "b")).unwrap();
        let summer = catalog.insert_album("Summer").unwrap();
        let family = catalog.insert_album("Family").unwrap();

        assert!(catalog.add_image_to_album(a, summer).unwrap());
        assert!(!catalog.add_image_to_album(a, summer).unwrap());
        catalog.add_image_to_album(a, family).unwrap();

        let unassigned: Vec<i64> = catalog.get_unassigned_images().unwrap().iter().map(|i| i.id).collect();
        assert_eq!(unassigned, vec![b]);

        let names: Vec<String> = catalog
            .get_albums_by_image(a)
            .unwrap()
            .into_iter()
            .map(|album| album.name)
            .collect();
        assert_eq!(names, vec!["Family".to_string(), "Summer".to_string()]);

        assert!(catalog.remove_image_from_album(a, family).unwrap());
        assert_eq!(catalog.get_images_by_album(family).unwrap().len(), 0);
        assert_eq!(catalog.get_images_by_album(summer).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_album_keeps_images() {
        let catalog = Catalog::open_in_memory().unwrap();
        let a = catalog.insert_image(&new_image("images/a.jpg", "a")).unwrap();
        let summer = catalog.insert_album("Summer").unwrap();
        catalog.add_image_to_album(a, summer).unwrap();

        assert!(catalog.delete_album(summer).unwrap());
        assert!(catalog.get_album(summer).unwrap().is_none());
        assert!(catalog.get_image(a).unwrap().is_some());
        assert_eq!(catalog.get_unassigned_images().unwrap().len(), 1);
        assert!(!catalog.delete_album(summer).unwrap());
    }
}
