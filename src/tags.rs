//! Tag service: create-or-fetch by name and image tagging.

use tracing::{debug, info};

use crate::db::{Catalog, Tag};
use crate::error::{Error, Result};

pub struct TagService<'a> {
    catalog: &'a Catalog,
}

impl<'a> TagService<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Create a tag, or fetch the existing one with the same trimmed name.
    pub fn create_tag(&self, name: &str) -> Result<Tag> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("Tag name cannot be empty"));
        }

        let id = self.catalog.insert_tag(name)?;
        info!("Tag {:?} has id {}", name, id);
        Ok(Tag {
            id,
            name: name.to_string(),
        })
    }

    pub fn all_tags(&self) -> Result<Vec<Tag>> {
        self.catalog.get_all_tags()
    }

    pub fn used_tags(&self) -> Result<Vec<Tag>> {
        self.catalog.get_used_tags()
    }

    pub fn image_tags(&self, image_id: i64) -> Result<Vec<Tag>> {
        self.require_image(image_id)?;
        self.catalog.get_image_tags(image_id)
    }

    /// Attach a tag. Returns false when the image already had it.
    pub fn add_tag_to_image(&self, image_id: i64, tag_id: i64) -> Result<bool> {
        self.require_image(image_id)?;
        self.require_tag(tag_id)?;

        let added = self.catalog.add_image_tag(image_id, tag_id)?;
        debug!("Tag {} on image {}: added={}", tag_id, image_id, added);
        Ok(added)
    }

    pub fn remove_tag_from_image(&self, image_id: i64, tag_id: i64) -> Result<bool> {
        self.require_image(image_id)?;
        self.require_tag(tag_id)?;
        self.catalog.remove_image_tag(image_id, tag_id)
    }

    fn require_image(&self, image_id: i64) -> Result<()> {
        match self.catalog.get_image(image_id)? {
            Some(_) => Ok(()),
            None => Err(Error::not_found("Image", image_id)),
        }
    }

    fn require_tag(&self, tag_id: i64) -> Result<()> {
        match self.catalog.get_tag(tag_id)? {
            Some(_) => Ok(()),
            None => Err(Error::not_found("Tag", tag_id)),
        }
    }
}
