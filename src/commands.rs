//! Command surface consumed by a UI shell.
//!
//! Every command returns a [`CommandResponse`] that serializes as
//! `{"success": true, ...data}` or `{"success": false, "error": "..."}`.
//! Mutating commands add a `changed` object listing the image, tag and
//! album ids they touched; deciding which view to refresh is left to the
//! caller.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::{Component, Path, PathBuf};
use std::sync::mpsc;
use tracing::error;

use crate::albums::AlbumService;
use crate::config::Config;
use crate::db::Catalog;
use crate::error::{Error, Result};
use crate::export::{self, ExportProgress};
use crate::images::ImageService;
use crate::import::{ImportProgress, ImportService, ImportSummary};
use crate::photos_api::{self, GooglePhotosClient};
use crate::search;
use crate::storage::Storage;
use crate::tags::TagService;
use crate::thumbnails::ThumbnailManager;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl CommandResponse {
    pub fn ok(data: Map<String, Value>) -> Self {
        Self {
            success: true,
            error: None,
            data,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            data: Map::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }
}

/// Ids touched by a mutating command.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Changes {
    pub images: Vec<i64>,
    pub tags: Vec<i64>,
    pub albums: Vec<i64>,
}

impl Changes {
    fn images(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            images: ids.into_iter().collect(),
            ..Default::default()
        }
    }

    fn with_tags(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.tags.extend(ids);
        self
    }

    fn with_albums(mut self, ids: impl IntoIterator<Item = i64>) -> Self {
        self.albums.extend(ids);
        self
    }
}

/// Owns the catalog, the managed storage and the configuration for one
/// session.
pub struct Commands {
    config: Config,
    catalog: Catalog,
    storage: Storage,
}

impl Commands {
    /// Open the catalog under the configured data directory.
    pub fn open(config: Config) -> Result<Self> {
        let storage = Storage::new(&config.data_dir);
        storage.ensure_dirs()?;
        let catalog = Catalog::open(&config.catalog_path())?;
        Ok(Self {
            config,
            catalog,
            storage,
        })
    }

    pub fn with_catalog(config: Config, catalog: Catalog) -> Self {
        let storage = Storage::new(&config.data_dir);
        Self {
            config,
            catalog,
            storage,
        }
    }

    pub fn close(&mut self) -> Result<()> {
        self.catalog.close()
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    // --- Import ---

    pub fn import_files(
        &self,
        paths: &[PathBuf],
        album_id: Option<i64>,
        progress_tx: Option<mpsc::Sender<ImportProgress>>,
    ) -> CommandResponse {
        self.run("import_files", || {
            let summary = self.importer().import_local(paths, album_id, progress_tx)?;
            Ok(import_payload(summary, album_id))
        })
    }

    pub fn import_folder(
        &self,
        folder: &Path,
        album_id: Option<i64>,
        progress_tx: Option<mpsc::Sender<ImportProgress>>,
    ) -> CommandResponse {
        self.run("import_folder", || {
            let summary = self.importer().import_folder(
                folder,
                &self.config.import.image_extensions,
                album_id,
                progress_tx,
            )?;
            Ok(import_payload(summary, album_id))
        })
    }

    pub fn import_external(
        &self,
        album_id: Option<i64>,
        progress_tx: Option<mpsc::Sender<ImportProgress>>,
    ) -> CommandResponse {
        self.run("import_external", || {
            let client =
                GooglePhotosClient::new(self.config.google_photos.clone(), self.storage.data_dir());
            let summary = self
                .importer()
                .import_from_source(&client, album_id, progress_tx)?;
            Ok(import_payload(summary, album_id))
        })
    }

    pub fn authorize_external(&self) -> CommandResponse {
        self.run("authorize_external", || {
            photos_api::authorize(&self.config.google_photos, self.storage.data_dir())?;
            Ok(object(json!({ "authorized": true })))
        })
    }

    // --- Images ---

    pub fn list_images(&self) -> CommandResponse {
        self.run("list_images", || {
            let images = self.images();
            let details = images.with_details(images.list()?)?;
            Ok(object(json!({ "images": details })))
        })
    }

    pub fn get_image(&self, image_id: i64) -> CommandResponse {
        self.run("get_image", || {
            let images = self.images();
            let image = images.get(image_id)?;
            let details = images.with_details(vec![image])?;
            Ok(object(json!({ "image": details.first() })))
        })
    }

    pub fn delete_image(&self, image_id: i64) -> CommandResponse {
        self.run("delete_image", || {
            let deleted = self.images().delete(image_id)?;
            Ok(changed(
                json!({ "deleted": deleted }),
                Changes::images([image_id]),
            ))
        })
    }

    pub fn rename_image(&self, image_id: i64, new_name: &str) -> CommandResponse {
        self.run("rename_image", || {
            let image = self.images().rename(image_id, new_name)?;
            Ok(changed(json!({ "image": image }), Changes::images([image_id])))
        })
    }

    /// Partial failures still yield `success: true`; the per-id breakdown
    /// is in the payload.
    pub fn bulk_delete_images(&self, image_ids: &[i64]) -> CommandResponse {
        self.run("bulk_delete_images", || {
            if image_ids.is_empty() {
                return Err(Error::validation("No images selected"));
            }
            let result = self.images().delete_many(image_ids);
            let changes = Changes::images(result.deleted_ids.iter().copied());
            Ok(changed(
                json!({
                    "succeeded": result.succeeded,
                    "failed": result.failed,
                    "errors": result.errors,
                }),
                changes,
            ))
        })
    }

    pub fn full_path(&self, stored_path: &str) -> CommandResponse {
        self.run("full_path", || {
            let relative = Path::new(stored_path);
            let escapes = relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if stored_path.trim().is_empty() || escapes {
                return Err(Error::validation(format!("Invalid stored path: {}", stored_path)));
            }
            Ok(object(json!({ "path": self.storage.full_path(stored_path) })))
        })
    }

    pub fn generate_missing_thumbnails(&self) -> CommandResponse {
        self.run("generate_missing_thumbnails", || {
            let thumbnails = ThumbnailManager::new(&self.storage, &self.config.thumbnails);
            let generated = thumbnails.generate_missing(&self.catalog)?;
            Ok(object(json!({ "generated": generated })))
        })
    }

    // --- Tags ---

    pub fn list_tags(&self) -> CommandResponse {
        self.run("list_tags", || {
            Ok(object(json!({ "tags": self.tags().all_tags()? })))
        })
    }

    pub fn list_used_tags(&self) -> CommandResponse {
        self.run("list_used_tags", || {
            Ok(object(json!({ "tags": self.tags().used_tags()? })))
        })
    }

    pub fn create_tag(&self, name: &str) -> CommandResponse {
        self.run("create_tag", || {
            let tag = self.tags().create_tag(name)?;
            let changes = Changes::default().with_tags([tag.id]);
            Ok(changed(json!({ "tag": tag }), changes))
        })
    }

    pub fn add_tag_to_image(&self, image_id: i64, tag_id: i64) -> CommandResponse {
        self.run("add_tag_to_image", || {
            let added = self.tags().add_tag_to_image(image_id, tag_id)?;
            Ok(changed(
                json!({ "added": added }),
                Changes::images([image_id]).with_tags([tag_id]),
            ))
        })
    }

    pub fn remove_tag_from_image(&self, image_id: i64, tag_id: i64) -> CommandResponse {
        self.run("remove_tag_from_image", || {
            let removed = self.tags().remove_tag_from_image(image_id, tag_id)?;
            Ok(changed(
                json!({ "removed": removed }),
                Changes::images([image_id]).with_tags([tag_id]),
            ))
        })
    }

    pub fn tags_for_image(&self, image_id: i64) -> CommandResponse {
        self.run("tags_for_image", || {
            Ok(object(json!({ "tags": self.tags().image_tags(image_id)? })))
        })
    }

    pub fn search_by_tags(&self, tag_ids: &[i64]) -> CommandResponse {
        self.run("search_by_tags", || {
            let found = search::search_by_tags(&self.catalog, tag_ids)?;
            let details = self.images().with_details(found)?;
            Ok(object(json!({ "images": details })))
        })
    }

    // --- Albums ---

    pub fn list_albums(&self) -> CommandResponse {
        self.run("list_albums", || {
            Ok(object(json!({ "albums": self.albums().all_albums()? })))
        })
    }

    pub fn create_album(&self, name: &str) -> CommandResponse {
        self.run("create_album", || {
            let album = self.albums().create_album(name)?;
            let changes = Changes::default().with_albums([album.id]);
            Ok(changed(json!({ "album": album }), changes))
        })
    }

    pub fn add_image_to_album(&self, image_id: i64, album_id: i64) -> CommandResponse {
        self.run("add_image_to_album", || {
            let added = self.albums().add_image_to_album(image_id, album_id)?;
            Ok(changed(
                json!({ "added": added }),
                Changes::images([image_id]).with_albums([album_id]),
            ))
        })
    }

    pub fn remove_image_from_album(&self, image_id: i64, album_id: i64) -> CommandResponse {
        self.run("remove_image_from_album", || {
            let removed = self.albums().remove_image_from_album(image_id, album_id)?;
            Ok(changed(
                json!({ "removed": removed }),
                Changes::images([image_id]).with_albums([album_id]),
            ))
        })
    }

    pub fn albums_for_image(&self, image_id: i64) -> CommandResponse {
        self.run("albums_for_image", || {
            Ok(object(json!({ "albums": self.albums().albums_for_image(image_id)? })))
        })
    }

    pub fn album_images(&self, album_id: i64) -> CommandResponse {
        self.run("album_images", || {
            let found = self.albums().images_in_album(album_id)?;
            let details = self.images().with_details(found)?;
            Ok(object(json!({ "images": details })))
        })
    }

    pub fn unassigned_images(&self) -> CommandResponse {
        self.run("unassigned_images", || {
            let found = self.albums().unassigned_images()?;
            let details = self.images().with_details(found)?;
            Ok(object(json!({ "images": details })))
        })
    }

    pub fn delete_album(&self, album_id: i64, delete_photos: bool) -> CommandResponse {
        self.run("delete_album", || {
            let outcome = self.albums().delete_album(album_id, delete_photos)?;
            let touched = outcome
                .deleted_image_ids
                .iter()
                .chain(outcome.unassigned_image_ids.iter())
                .copied();
            let changes = Changes::images(touched).with_albums([album_id]);
            Ok(changed(
                json!({
                    "deleted": outcome.deleted,
                    "deleted_image_ids": outcome.deleted_image_ids,
                    "unassigned_image_ids": outcome.unassigned_image_ids,
                }),
                changes,
            ))
        })
    }

    // --- Export ---

    pub fn export_zip(
        &self,
        image_ids: &[i64],
        dest: &Path,
        progress_tx: Option<mpsc::Sender<ExportProgress>>,
    ) -> CommandResponse {
        self.run("export_zip", || {
            let summary =
                export::export_as_zip(&self.catalog, &self.storage, image_ids, dest, progress_tx)?;
            Ok(object(json!({
                "path": summary.path,
                "archived": summary.archived,
                "skipped": summary.skipped,
            })))
        })
    }

    fn run<F>(&self, command: &str, f: F) -> CommandResponse
    where
        F: FnOnce() -> Result<Map<String, Value>>,
    {
        match f() {
            Ok(data) => CommandResponse::ok(data),
            Err(e) => {
                error!("{} failed: {}", command, e);
                CommandResponse::failure(e.to_string())
            }
        }
    }

    fn images(&self) -> ImageService<'_> {
        ImageService::new(&self.catalog, &self.storage)
    }

    fn tags(&self) -> TagService<'_> {
        TagService::new(&self.catalog)
    }

    fn albums(&self) -> AlbumService<'_> {
        AlbumService::new(&self.catalog, &self.storage)
    }

    fn importer(&self) -> ImportService<'_> {
        ImportService::new(&self.catalog, &self.storage, &self.config.thumbnails)
    }
}

fn import_payload(summary: ImportSummary, album_id: Option<i64>) -> Map<String, Value> {
    let changes = Changes::images(summary.image_ids.iter().copied()).with_albums(album_id);
    changed(
        json!({
            "image_ids": summary.image_ids,
            "failed": summary.failed,
            "errors": summary.errors,
        }),
        changes,
    )
}

fn changed(data: Value, changes: Changes) -> Map<String, Value> {
    let mut map = object(data);
    map.insert("changed".to_string(), json!(changes));
    map
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
    }
}
