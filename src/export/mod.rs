//! Zip export of selected catalog images.

use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime};

use crate::db::{Catalog, Image};
use crate::error::{Error, Result};
use crate::storage::Storage;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportProgress {
    Started { total: usize },
    Item { current: usize, total: usize, image_id: i64 },
    Completed { archived: usize, skipped: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub archived: usize,
    /// Ids with no catalog row or no file on disk.
    pub skipped: Vec<i64>,
}

/// Bundle the given images into a zip archive at `dest`.
///
/// Entries are stored uncompressed under their display names; repeated
/// names get a numeric suffix. The archive is written to a temporary file
/// next to `dest` and moved into place when complete.
pub fn export_as_zip(
    catalog: &Catalog,
    storage: &Storage,
    image_ids: &[i64],
    dest: &Path,
    progress_tx: Option<mpsc::Sender<ExportProgress>>,
) -> Result<ExportSummary> {
    if image_ids.is_empty() {
        return Err(Error::validation("No images to export"));
    }

    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let total = image_ids.len();
    if let Some(ref tx) = progress_tx {
        let _ = tx.send(ExportProgress::Started { total });
    }

    let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
    let mut names = EntryNames::default();
    let mut archived = 0;
    let mut skipped = Vec::new();

    {
        let mut zf = zip::ZipWriter::new(tmp.as_file_mut());

        for (index, &image_id) in image_ids.iter().enumerate() {
            match catalog.get_image(image_id)? {
                None => {
                    warn!("Image with id {} not found, skipping", image_id);
                    skipped.push(image_id);
                }
                Some(image) => {
                    let path = storage.full_path(&image.stored_path);
                    if path.is_file() {
                        let extension = entry_extension(&image);
                        let name = names.claim(&image.filename, &extension);
                        debug!("Adding {:?} as {:?}", path, name);

                        zf.start_file(
                            name,
                            SimpleFileOptions::default()
                                .compression_method(CompressionMethod::Stored)
                                .last_modified_time(DateTime::default_for_write()),
                        )?;
                        let mut file = File::open(&path)?;
                        std::io::copy(&mut file, &mut zf)?;
                        archived += 1;
                    } else {
                        warn!("Image file not found: {:?}, skipping", path);
                        skipped.push(image_id);
                    }
                }
            }

            if let Some(ref tx) = progress_tx {
                let _ = tx.send(ExportProgress::Item {
                    current: index + 1,
                    total,
                    image_id,
                });
            }
        }

        zf.finish()?.flush()?;
    }

    tmp.persist(dest).map_err(|e| Error::Io(e.error))?;
    info!(
        "Exported {} images to {:?} ({} skipped)",
        archived,
        dest,
        skipped.len()
    );

    if let Some(ref tx) = progress_tx {
        let _ = tx.send(ExportProgress::Completed {
            archived,
            skipped: skipped.len(),
        });
    }

    Ok(ExportSummary {
        path: dest.to_path_buf(),
        archived,
        skipped,
    })
}

/// Extension for the archive entry: the catalog value, or the stored
/// file's extension when the catalog value is unusable. Always dotted.
fn entry_extension(image: &Image) -> String {
    let recorded = image.extension.trim();
    let extension = if recorded.is_empty() || recorded == "null" || recorded == "undefined" {
        Path::new(&image.stored_path)
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default()
    } else {
        recorded.to_string()
    };

    if extension.is_empty() || extension.starts_with('.') {
        extension
    } else {
        format!(".{}", extension)
    }
}

/// Hands out unique entry names: `name.ext`, then `name_1.ext`, `name_2.ext`...
#[derive(Default)]
struct EntryNames {
    used: HashSet<String>,
}

impl EntryNames {
    fn claim(&mut self, stem: &str, extension: &str) -> String {
        let mut candidate = format!("{}{}", stem, extension);
        let mut counter = 1;
        while self.used.contains(&candidate) {
            candidate = format!("{}_{}{}", stem, counter, extension);
            counter += 1;
        }
        self.used.insert(candidate.clone());
        candidate
    }
}
