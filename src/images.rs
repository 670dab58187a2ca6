//! Image service: lookup, rename and deletion of catalog images together
//! with their files in managed storage.

use serde::Serialize;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, error, info, warn};

use crate::db::{Catalog, Image, Tag};
use crate::error::{Error, Result};
use crate::storage::Storage;

/// Outcome of a bulk delete. One failing id never stops the others.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkDeleteResult {
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<String>,
    pub deleted_ids: Vec<i64>,
}

/// An image with its resolved on-disk locations and tags, as list views show it.
#[derive(Debug, Clone, Serialize)]
pub struct ImageDetails {
    #[serde(flatten)]
    pub image: Image,
    pub full_path: PathBuf,
    pub thumbnail_full_path: Option<PathBuf>,
    pub tags: Vec<Tag>,
}

pub struct ImageService<'a> {
    catalog: &'a Catalog,
    storage: &'a Storage,
}

impl<'a> ImageService<'a> {
    pub fn new(catalog: &'a Catalog, storage: &'a Storage) -> Self {
        Self { catalog, storage }
    }

    pub fn get(&self, image_id: i64) -> Result<Image> {
        self.catalog
            .get_image(image_id)?
            .ok_or_else(|| Error::not_found("Image", image_id))
    }

    pub fn list(&self) -> Result<Vec<Image>> {
        self.catalog.get_all_images()
    }

    /// Attach absolute paths and tags to each image.
    pub fn with_details(&self, images: Vec<Image>) -> Result<Vec<ImageDetails>> {
        images
            .into_iter()
            .map(|image| {
                let tags = self.catalog.get_image_tags(image.id)?;
                Ok(ImageDetails {
                    full_path: self.storage.full_path(&image.stored_path),
                    thumbnail_full_path: image
                        .thumbnail_path
                        .as_deref()
                        .map(|p| self.storage.full_path(p)),
                    tags,
                    image,
                })
            })
            .collect()
    }

    /// Change the display name. The extension is kept.
    pub fn rename(&self, image_id: i64, new_name: &str) -> Result<Image> {
        let name = new_name.trim();
        if name.is_empty() {
            return Err(Error::validation("Image name cannot be empty"));
        }
        if name.contains('/') || name.contains('\\') {
            return Err(Error::validation("Image name cannot contain path separators"));
        }

        if !self.catalog.update_image_filename(image_id, name)? {
            return Err(Error::not_found("Image", image_id));
        }
        info!("Renamed image {} to {:?}", image_id, name);
        self.get(image_id)
    }

    /// Delete an image's stored file, its thumbnail, then its catalog row.
    ///
    /// File removal is best effort: a missing or undeletable file is logged
    /// and the row is still removed. Orphaned files are possible, a row
    /// pointing at removed files is not.
    pub fn delete(&self, image_id: i64) -> Result<bool> {
        let image = self.get(image_id)?;

        self.remove_managed_file(&image.stored_path);
        if let Some(ref thumbnail) = image.thumbnail_path {
            self.remove_managed_file(thumbnail);
        }

        let deleted = self.catalog.delete_image(image_id)?;
        if deleted {
            info!("Deleted image {} ({})", image_id, image.display_name());
        }
        Ok(deleted)
    }

    pub fn delete_many(&self, image_ids: &[i64]) -> BulkDeleteResult {
        let mut result = BulkDeleteResult::default();

        for &image_id in image_ids {
            match self.delete(image_id) {
                Ok(true) => {
                    result.succeeded += 1;
                    result.deleted_ids.push(image_id);
                }
                Ok(false) => {
                    result.failed += 1;
                    result.errors.push(format!("Image {}: Failed to delete", image_id));
                }
                Err(e) => {
                    result.failed += 1;
                    result.errors.push(format!("Image {}: {}", image_id, e));
                }
            }
        }

        if result.failed > 0 {
            warn!(
                "Bulk delete: {} deleted, {} failed",
                result.succeeded, result.failed
            );
        }
        result
    }

    fn remove_managed_file(&self, relative: &str) {
        let path = self.storage.full_path(relative);
        match fs::remove_file(&path) {
            Ok(()) => debug!("Removed {:?}", path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("File already gone: {:?}", path)
            }
            Err(e) => error!("Error deleting file {:?}: {}", path, e),
        }
    }
}
