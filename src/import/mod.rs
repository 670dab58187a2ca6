//! Import of local files, folders and remote library items into managed storage.

pub mod discovery;

use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ThumbnailConfig;
use crate::db::{split_extension, Catalog, ImportSource, NewImage};
use crate::error::{Error, Result};
use crate::photos_api::PhotoSource;
use crate::storage::Storage;
use crate::thumbnails::ThumbnailManager;

pub use discovery::discover_images;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportProgress {
    Started { total: usize },
    /// Sent once per source item, whether or not it was imported.
    Item { current: usize, total: usize, name: String },
    Completed { imported: usize, failed: usize },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub image_ids: Vec<i64>,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Copies or downloads files into managed storage and records them.
pub struct ImportService<'a> {
    catalog: &'a Catalog,
    storage: &'a Storage,
    thumbnails: ThumbnailManager,
}

impl<'a> ImportService<'a> {
    pub fn new(catalog: &'a Catalog, storage: &'a Storage, thumbnails: &ThumbnailConfig) -> Self {
        Self {
            catalog,
            storage,
            thumbnails: ThumbnailManager::new(storage, thumbnails),
        }
    }

    /// Import local files. Items that are missing or fail to copy are
    /// reported and skipped; the rest of the batch carries on.
    pub fn import_local(
        &self,
        paths: &[PathBuf],
        album_id: Option<i64>,
        progress_tx: Option<mpsc::Sender<ImportProgress>>,
    ) -> Result<ImportSummary> {
        self.prepare(album_id)?;

        let total = paths.len();
        send(&progress_tx, ImportProgress::Started { total });

        let mut summary = ImportSummary::default();
        for (index, path) in paths.iter().enumerate() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.to_string_lossy().to_string());

            match self.import_local_file(path, &name, album_id) {
                Ok(image_id) => summary.image_ids.push(image_id),
                Err(e) => {
                    warn!("Error importing file {:?}: {}", path, e);
                    summary.failed += 1;
                    summary.errors.push(format!("{}: {}", path.display(), e));
                }
            }

            send(
                &progress_tx,
                ImportProgress::Item {
                    current: index + 1,
                    total,
                    name,
                },
            );
        }

        self.finish(&summary, &progress_tx);
        Ok(summary)
    }

    /// Import every image under `folder`. A folder without images is a
    /// validation error.
    pub fn import_folder(
        &self,
        folder: &Path,
        extensions: &[String],
        album_id: Option<i64>,
        progress_tx: Option<mpsc::Sender<ImportProgress>>,
    ) -> Result<ImportSummary> {
        let paths = discover_images(folder, extensions)?;
        if paths.is_empty() {
            return Err(Error::validation(format!(
                "No image files found in {}",
                folder.display()
            )));
        }
        info!("Found {} images in {:?}", paths.len(), folder);
        self.import_local(&paths, album_id, progress_tx)
    }

    /// Import image items from a remote library. Authentication problems
    /// fail the whole call; per-item download failures do not.
    pub fn import_from_source(
        &self,
        source: &dyn PhotoSource,
        album_id: Option<i64>,
        progress_tx: Option<mpsc::Sender<ImportProgress>>,
    ) -> Result<ImportSummary> {
        self.prepare(album_id)?;
        source.ensure_authenticated()?;

        let items: Vec<_> = source
            .list_media_items()?
            .into_iter()
            .filter(|item| item.is_image())
            .collect();

        let total = items.len();
        send(&progress_tx, ImportProgress::Started { total });

        let mut summary = ImportSummary::default();
        for (index, item) in items.iter().enumerate() {
            let name = item.display_name();

            let result = self.store_new(&name, album_id, ImportSource::GooglePhotos, |dest| {
                source.download(item, dest)?;
                Ok(item.base_url.clone().unwrap_or_default())
            });
            match result {
                Ok(image_id) => summary.image_ids.push(image_id),
                Err(e) => {
                    warn!("Error importing remote item {}: {}", item.id, e);
                    summary.failed += 1;
                    summary.errors.push(format!("{}: {}", name, e));
                }
            }

            send(
                &progress_tx,
                ImportProgress::Item {
                    current: index + 1,
                    total,
                    name,
                },
            );
        }

        self.finish(&summary, &progress_tx);
        Ok(summary)
    }

    fn prepare(&self, album_id: Option<i64>) -> Result<()> {
        if let Some(album_id) = album_id {
            if self.catalog.get_album(album_id)?.is_none() {
                return Err(Error::not_found("Album", album_id));
            }
        }
        self.storage.ensure_dirs()
    }

    fn finish(&self, summary: &ImportSummary, progress_tx: &Option<mpsc::Sender<ImportProgress>>) {
        info!(
            "Import finished: {} imported, {} failed",
            summary.image_ids.len(),
            summary.failed
        );
        send(
            progress_tx,
            ImportProgress::Completed {
                imported: summary.image_ids.len(),
                failed: summary.failed,
            },
        );
    }

    fn import_local_file(&self, path: &Path, name: &str, album_id: Option<i64>) -> Result<i64> {
        if !path.is_file() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path.display()),
            )));
        }

        self.store_new(name, album_id, ImportSource::Local, |dest| {
            fs::copy(path, dest)?;
            Ok(path.to_string_lossy().to_string())
        })
    }

    /// Allocate a stored path, let `fetch` fill it, then thumbnail and record
    /// it. `fetch` returns the value kept as the image's original path.
    /// Files are removed again if the fetch or the row write fails.
    fn store_new<F>(
        &self,
        original_filename: &str,
        album_id: Option<i64>,
        source: ImportSource,
        fetch: F,
    ) -> Result<i64>
    where
        F: FnOnce(&Path) -> Result<String>,
    {
        let stored_path = self.storage.allocate_image_path(original_filename);
        let full_path = self.storage.full_path(&stored_path);

        let original_path = match fetch(&full_path) {
            Ok(original_path) => original_path,
            Err(e) => {
                let _ = fs::remove_file(&full_path);
                return Err(e);
            }
        };
        let thumbnail_path = self.thumbnails.generate(&full_path);
        let (filename, extension) = split_extension(original_filename);

        let recorded = self
            .catalog
            .insert_image(&NewImage {
                original_path: &original_path,
                stored_path: &stored_path,
                thumbnail_path: thumbnail_path.as_deref(),
                filename,
                extension,
                imported_from: source,
            })
            .and_then(|image_id| {
                if let Some(album_id) = album_id {
                    self.catalog.add_image_to_album(image_id, album_id)?;
                }
                Ok(image_id)
            });

        match recorded {
            Ok(image_id) => {
                debug!("Imported {:?} as image {}", original_filename, image_id);
                Ok(image_id)
            }
            Err(e) => {
                let _ = fs::remove_file(&full_path);
                if let Some(ref thumbnail) = thumbnail_path {
                    let _ = fs::remove_file(self.storage.full_path(thumbnail));
                }
                Err(e)
            }
        }
    }
}

fn send(progress_tx: &Option<mpsc::Sender<ImportProgress>>, event: ImportProgress) {
    if let Some(ref tx) = progress_tx {
        let _ = tx.send(event);
    }
}
