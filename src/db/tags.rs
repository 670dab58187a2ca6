//! Tags and the image/tag association.

use serde::Serialize;

use super::images::{row_to_image, Image, IMAGE_COLUMNS};
use super::Catalog;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

fn row_to_tag(row: &rusqlite::Row) -> rusqlite::Result<Tag> {
    Ok(Tag {
        id: row.get(0)?,
        name: row.get(1)?,
    })
}

impl Catalog {
    /// Create a tag or return the id of the existing one with this exact name.
    pub fn insert_tag(&self, name: &str) -> Result<i64> {
        let id = self.conn()?.query_row(
            r#"
            INSERT INTO tags (name) VALUES (?)
            ON CONFLICT(name) DO UPDATE SET name = excluded.name
            RETURNING id
            "#,
            [name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn get_tag(&self, tag_id: i64) -> Result<Option<Tag>> {
        let result = self.conn()?.query_row(
            "SELECT id, name FROM tags WHERE id = ?",
            [tag_id],
            row_to_tag,
        );
        match result {
            Ok(tag) => Ok(Some(tag)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_tag_by_name(&self, name: &str) -> Result<Option<Tag>> {
        let result = self.conn()?.query_row(
            "SELECT id, name FROM tags WHERE name = ?",
            [name],
            row_to_tag,
        );
        match result {
            Ok(tag) => Ok(Some(tag)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_all_tags(&self) -> Result<Vec<Tag>> {
        self.query_tags("SELECT id, name FROM tags ORDER BY name", [])
    }

    /// Tags attached to at least one image.
    pub fn get_used_tags(&self) -> Result<Vec<Tag>> {
        self.query_tags(
            r#"
            SELECT DISTINCT t.id, t.name
            FROM tags t
            JOIN image_tags it ON it.tag_id = t.id
            ORDER BY t.name
            "#,
            [],
        )
    }

    pub fn get_image_tags(&self, image_id: i64) -> Result<Vec<Tag>> {
        self.query_tags(
            r#"
            SELECT t.id, t.name
            FROM tags t
            JOIN image_tags it ON it.tag_id = t.id
            WHERE it.image_id = ?
            ORDER BY t.name
            "#,
            [image_id],
        )
    }

    /// Returns false when the pair was already present.
    pub fn add_image_tag(&self, image_id: i64, tag_id: i64) -> Result<bool> {
        let changed = self.conn()?.execute(
            "INSERT OR IGNORE INTO image_tags (image_id, tag_id) VALUES (?, ?)",
            rusqlite::params![image_id, tag_id],
        )?;
        Ok(changed > 0)
    }

    pub fn remove_image_tag(&self, image_id: i64, tag_id: i64) -> Result<bool> {
        let changed = self.conn()?.execute(
            "DELETE FROM image_tags WHERE image_id = ? AND tag_id = ?",
            rusqlite::params![image_id, tag_id],
        )?;
        Ok(changed > 0)
    }

    /// Images carrying any of the given tags, each once, newest first.
    /// An empty tag list matches nothing.
    pub fn get_images_by_tags(&self, tag_ids: &[i64]) -> Result<Vec<Image>> {
        if tag_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders: Vec<&str> = tag_ids.iter().map(|_| "?").collect();
        let sql = format!(
            r#"
            SELECT {}
            FROM images i
            WHERE i.id IN (SELECT image_id FROM image_tags WHERE tag_id IN ({}))
            ORDER BY i.imported_at DESC, i.id DESC
            "#,
            IMAGE_COLUMNS,
            placeholders.join(",")
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let images = stmt
            .query_map(rusqlite::params_from_iter(tag_ids.iter()), row_to_image)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(images)
    }

    fn query_tags<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Tag>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let tags = stmt
            .query_map(params, row_to_tag)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::new_image;

    #[test]
    fn test_insert_tag_returns_existing_id() {
        let catalog = Catalog::open_in_memory().unwrap();
        let first = catalog.insert_tag("beach").unwrap();
        let again = catalog.insert_tag("beach").unwrap();
        let other = catalog.insert_tag("Beach").unwrap();

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(catalog.get_all_tags().unwrap().len(), 2);
        assert_eq!(catalog.get_tag_by_name("beach").unwrap().unwrap().id, first);
    }

    #[test]
    fn test_images_by_tags_is_union_without_duplicates() {
        let catalog = Catalog::open_in_memory().unwrap();
        let a = catalog.insert_image(&new_image("images/a.jpg", "a")).unwrap();
        let b = catalog.insert_image(&new_image("images/b.jpg", "b")).unwrap();
        let c = catalog.insert_image(&new_image("images/c.jpg", "c")).unwrap();
        let beach = catalog.insert_tag("beach").unwrap();
        let sunset = catalog.insert_tag("sunset").unwrap();
        let city = catalog.insert_tag("city").unwrap();

        catalog.add_image_tag(a, beach).unwrap();
        catalog.add_image_tag(a, sunset).unwrap();
        catalog.add_image_tag(b, sunset).unwrap();
        catalog.add_image_tag(c, city).unwrap();

        let ids: Vec<i64> = catalog
            .get_images_by_tags(&[beach, sunset])
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec![b, a]);

        assert!(catalog.get_images_by_tags(&[]).unwrap().is_empty());
        assert!(catalog.get_images_by_tags(&[9999]).unwrap().is_empty());
    }

    #[test]
    fn test_add_and_remove_image_tag() {
        let catalog = Catalog::open_in_memory().unwrap();
        let image = catalog.insert_image(&new_image("images/a.jpg", "a")).unwrap();
        let tag = catalog.insert_tag("beach").unwrap();
        let unused = catalog.insert_tag("unused").unwrap();

        assert!(catalog.add_image_tag(image, tag).unwrap());
        assert!(!catalog.add_image_tag(image, tag).unwrap());

        let used: Vec<i64> = catalog.get_used_tags().unwrap().iter().map(|t| t.id).collect();
        assert_eq!(used, vec![tag]);
        assert!(!used.contains(&unused));

        assert!(catalog.remove_image_tag(image, tag).unwrap());
        assert!(!catalog.remove_image_tag(image, tag).unwrap());
        assert!(catalog.get_image_tags(image).unwrap().is_empty());
        // Unused tags are kept.
        assert_eq!(catalog.get_all_tags().unwrap().len(), 2);
    }
}
