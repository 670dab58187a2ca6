//! Managed storage layout under the data directory.
//!
//! ```text
//! <data_dir>/database.db
//! <data_dir>/images/<generated name>
//! <data_dir>/thumbnails/<stem>_thumb.jpg
//! ```
//!
//! Paths recorded in the catalog are relative to `<data_dir>` and always
//! use `/` as separator.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const IMAGES_DIR: &str = "images";
pub const THUMBNAILS_DIR: &str = "thumbnails";

#[derive(Debug, Clone)]
pub struct Storage {
    data_dir: PathBuf,
}

impl Storage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join(IMAGES_DIR)
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.data_dir.join(THUMBNAILS_DIR)
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.images_dir())?;
        fs::create_dir_all(self.thumbnails_dir())?;
        Ok(())
    }

    /// Absolute location of a catalog-relative path.
    pub fn full_path(&self, relative: &str) -> PathBuf {
        self.data_dir.join(relative)
    }

    /// Pick a fresh relative path under `images/` for an incoming file.
    ///
    /// The basename is reduced to ASCII alphanumerics and `_`, then suffixed
    /// with the current time in milliseconds. The extension is kept as given.
    /// Thumbnails are keyed by stem alone, so a stem already used by any
    /// stored image or thumbnail counts as taken and gets a counter appended.
    pub fn allocate_image_path(&self, original_filename: &str) -> String {
        let (stem, extension) = stem_and_extension(original_filename);
        let base = format!("{}_{}", sanitize_stem(stem), Utc::now().timestamp_millis());

        let mut candidate = base.clone();
        let mut counter = 1;
        while self.stem_taken(&candidate) {
            candidate = format!("{}_{}", base, counter);
            counter += 1;
        }

        format!("{}/{}{}", IMAGES_DIR, candidate, extension)
    }

    fn stem_taken(&self, stem: &str) -> bool {
        if self
            .thumbnails_dir()
            .join(format!("{}_thumb.jpg", stem))
            .exists()
        {
            return true;
        }

        let entries = match fs::read_dir(self.images_dir()) {
            Ok(entries) => entries,
            Err(_) => return false,
        };
        entries.filter_map(|entry| entry.ok()).any(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            stem_and_extension(&name).0 == stem
        })
    }
}

/// Basename split as `path.extname` does: the extension is the part from the
/// last dot, unless that dot starts the name.
fn stem_and_extension(filename: &str) -> (&str, &str) {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);
    match name.rfind('.') {
        Some(idx) if idx > 0 => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

fn sanitize_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_stem() {
        assert_eq!(sanitize_stem("My Photo (1)"), "My_Photo__1_");
        assert_eq!(sanitize_stem("été-2024"), "_t__2024");
        assert_eq!(sanitize_stem("IMG_0001"), "IMG_0001");
    }

    #[test]
    fn test_stem_and_extension() {
        assert_eq!(stem_and_extension("sunset.jpg"), ("sunset", ".jpg"));
        assert_eq!(stem_and_extension("/a/b/my.trip.png"), ("my.trip", ".png"));
        assert_eq!(stem_and_extension(".hidden"), (".hidden", ""));
        assert_eq!(stem_and_extension("noext"), ("noext", ""));
    }

    #[test]
    fn test_allocate_image_path_avoids_existing_files() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path());
        storage.ensure_dirs().unwrap();

        let first = storage.allocate_image_path("My Photo.jpg");
        assert!(first.starts_with("images/My_Photo_"));
        assert!(first.ends_with(".jpg"));
        fs::write(storage.full_path(&first), b"x").unwrap();

        let second = storage.allocate_image_path("My Photo.jpg");
        assert_ne!(first, second);
    }

    #[test]
    fn test_allocate_image_path_keeps_stems_unique_across_extensions() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path());
        storage.ensure_dirs().unwrap();

        let png = storage.allocate_image_path("photo.png");
        fs::write(storage.full_path(&png), b"x").unwrap();
        let bmp = storage.allocate_image_path("photo.bmp");
        assert!(bmp.ends_with(".bmp"));

        let stem = |p: &str| Path::new(p).file_stem().unwrap().to_string_lossy().to_string();
        assert_ne!(stem(&png), stem(&bmp));
    }

    #[test]
    fn test_allocate_image_path_avoids_existing_thumbnails() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path());
        storage.ensure_dirs().unwrap();

        let first = storage.allocate_image_path("orphan.jpg");
        let stem = Path::new(&first).file_stem().unwrap().to_string_lossy().to_string();
        fs::write(storage.thumbnails_dir().join(format!("{}_thumb.jpg", stem)), b"t").unwrap();

        let second = storage.allocate_image_path("orphan.jpg");
        assert_ne!(first, second);
    }

    #[test]
    fn test_layout() {
        let storage = Storage::new("/data");
        assert_eq!(storage.images_dir(), PathBuf::from("/data/images"));
        assert_eq!(storage.thumbnails_dir(), PathBuf::from("/data/thumbnails"));
        assert_eq!(
            storage.full_path("images/a_1.jpg"),
            PathBuf::from("/data/images/a_1.jpg")
        );
    }
}
