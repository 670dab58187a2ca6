//! Album service: creation, membership and deletion with a choice of what
//! happens to member photos.

use serde::Serialize;
use tracing::info;

use crate::db::{Album, Catalog, Image};
use crate::error::{Error, Result};
use crate::images::ImageService;
use crate::storage::Storage;

/// What an album deletion touched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AlbumDeletion {
    pub album_id: i64,
    pub deleted: bool,
    /// Member images removed entirely (files and rows).
    pub deleted_image_ids: Vec<i64>,
    /// Member images that survived and lost this album.
    pub unassigned_image_ids: Vec<i64>,
}

pub struct AlbumService<'a> {
    catalog: &'a Catalog,
    storage: &'a Storage,
}

impl<'a> AlbumService<'a> {
    pub fn new(catalog: &'a Catalog, storage: &'a Storage) -> Self {
        Self { catalog, storage }
    }

    pub fn create_album(&self, name: &str) -> Result<Album> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation("Album name cannot be empty"));
        }

        let id = self.catalog.insert_album(name)?;
        info!("Album {:?} has id {}", name, id);
        self.get(id)
    }

    pub fn get(&self, album_id: i64) -> Result<Album> {
        self.catalog
            .get_album(album_id)?
            .ok_or_else(|| Error::not_found("Album", album_id))
    }

    pub fn all_albums(&self) -> Result<Vec<Album>> {
        self.catalog.get_all_albums()
    }

    pub fn add_image_to_album(&self, image_id: i64, album_id: i64) -> Result<bool> {
        self.require_image(image_id)?;
        self.get(album_id)?;
        self.catalog.add_image_to_album(image_id, album_id)
    }

    pub fn remove_image_from_album(&self, image_id: i64, album_id: i64) -> Result<bool> {
        self.require_image(image_id)?;
        self.get(album_id)?;
        self.catalog.remove_image_from_album(image_id, album_id)
    }

    pub fn images_in_album(&self, album_id: i64) -> Result<Vec<Image>> {
        self.get(album_id)?;
        self.catalog.get_images_by_album(album_id)
    }

    pub fn albums_for_image(&self, image_id: i64) -> Result<Vec<Album>> {
        self.require_image(image_id)?;
        self.catalog.get_albums_by_image(image_id)
    }

    pub fn unassigned_images(&self) -> Result<Vec<Image>> {
        self.catalog.get_unassigned_images()
    }

    /// Delete an album. With `delete_photos` every member image is deleted
    /// through [`ImageService`]; otherwise members are only unassigned.
    pub fn delete_album(&self, album_id: i64, delete_photos: bool) -> Result<AlbumDeletion> {
        let album = self.get(album_id)?;
        let members: Vec<i64> = self
            .catalog
            .get_images_by_album(album_id)?
            .iter()
            .map(|image| image.id)
            .collect();

        let mut outcome = AlbumDeletion {
            album_id,
            ..Default::default()
        };

        if delete_photos {
            let images = ImageService::new(self.catalog, self.storage);
            for image_id in members {
                if images.delete(image_id)? {
                    outcome.deleted_image_ids.push(image_id);
                }
            }
        } else {
            self.catalog.remove_all_images_from_album(album_id)?;
            outcome.unassigned_image_ids = members;
        }

        outcome.deleted = self.catalog.delete_album(album_id)?;
        info!(
            "Deleted album {:?}: {} photos deleted, {} unassigned",
            album.name,
            outcome.deleted_image_ids.len(),
            outcome.unassigned_image_ids.len()
        );
        Ok(outcome)
    }

    fn require_image(&self, image_id: i64) -> Result<()> {
        match self.catalog.get_image(image_id)? {
            Some(_) => Ok(()),
            None => Err(Error::not_found("Image", image_id)),
        }
    }
}
