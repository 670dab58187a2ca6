//! Square JPEG thumbnails for stored images.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use rayon::prelude::*;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::ThumbnailConfig;
use crate::db::Catalog;
use crate::error::{Error, Result};
use crate::storage::{Storage, THUMBNAILS_DIR};

/// Derives square JPEG previews into `<data_dir>/thumbnails`.
pub struct ThumbnailManager {
    data_dir: PathBuf,
    size: u32,
    quality: u8,
}

impl ThumbnailManager {
    pub fn new(storage: &Storage, config: &ThumbnailConfig) -> Self {
        Self {
            data_dir: storage.data_dir().to_path_buf(),
            size: config.size,
            quality: config.quality.clamp(1, 100),
        }
    }

    /// Catalog-relative thumbnail path for a source image:
    /// `thumbnails/<stem>_thumb.jpg`.
    pub fn thumbnail_path_for(&self, source: &Path) -> String {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "image".to_string());
        format!("{}/{}_thumb.jpg", THUMBNAILS_DIR, stem)
    }

    /// Generate (or reuse) the thumbnail for `source`.
    ///
    /// Returns the catalog-relative path, or `None` when no thumbnail could
    /// be produced. Failures are logged, never propagated.
    pub fn generate(&self, source: &Path) -> Option<String> {
        match self.try_generate(source) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!("Thumbnail generation failed for {:?}: {}", source, e);
                None
            }
        }
    }

    fn try_generate(&self, source: &Path) -> Result<String> {
        if !source.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("source image not found: {}", source.display()),
            )));
        }

        let relative = self.thumbnail_path_for(source);
        let target = self.data_dir.join(&relative);
        if target.exists() {
            debug!("Reusing thumbnail {:?}", target);
            return Ok(relative);
        }

        let thumbnails_dir = self.data_dir.join(THUMBNAILS_DIR);
        fs::create_dir_all(&thumbnails_dir)?;

        let img = image::open(source)?;
        let img = apply_orientation(img, read_orientation(source));
        let thumbnail = self.crop_to_fill(img);
        let rgb = DynamicImage::ImageRgb8(thumbnail.to_rgb8());

        // Encode into a sibling temp file so a failed encode never leaves a
        // truncated thumbnail at the final path.
        let mut tmp = tempfile::NamedTempFile::new_in(&thumbnails_dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, self.quality))?;
            writer.flush()?;
        }
        tmp.persist(&target).map_err(|e| Error::Io(e.error))?;

        debug!("Generated thumbnail {:?}", target);
        Ok(relative)
    }

    /// Scale to cover the target box, then center-crop. Never upscales.
    fn crop_to_fill(&self, img: DynamicImage) -> DynamicImage {
        let (width, height) = (img.width(), img.height());
        if width <= self.size && height <= self.size {
            return img;
        }
        img.resize_to_fill(
            self.size.min(width),
            self.size.min(height),
            FilterType::Lanczos3,
        )
    }

    /// Create thumbnails for every catalog image that has none.
    /// Returns how many were generated and recorded.
    pub fn generate_missing(&self, catalog: &Catalog) -> Result<usize> {
        let images = catalog.images_missing_thumbnails()?;
        if images.is_empty() {
            return Ok(0);
        }
        info!("Generating {} missing thumbnails", images.len());

        let results: Vec<(i64, Option<String>)> = images
            .par_iter()
            .map(|image| (image.id, self.generate(&self.data_dir.join(&image.stored_path))))
            .collect();

        let mut generated = 0;
        for (image_id, thumbnail) in results {
            if let Some(path) = thumbnail {
                if catalog.update_image_thumbnail(image_id, &path)? {
                    generated += 1;
                }
            }
        }

        info!("Generated {} thumbnails", generated);
        Ok(generated)
    }
}

/// EXIF orientation (1-8) of a file, 1 when absent or unreadable.
fn read_orientation(path: &Path) -> u32 {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(_) => return 1,
    };

    let mut reader = BufReader::new(file);
    let exif = match exif::Reader::new().read_from_container(&mut reader) {
        Ok(e) => e,
        Err(_) => return 1,
    };

    exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|field| field.value.get_uint(0))
        .unwrap_or(1)
}

fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ImportSource, NewImage};
    use image::{GenericImageView, RgbImage};
    use tempfile::tempdir;

    fn manager(storage: &Storage) -> ThumbnailManager {
        ThumbnailManager::new(storage, &ThumbnailConfig::default())
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        RgbImage::from_pixel(width, height, image::Rgb([200, 120, 40]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn test_generate_crops_to_square() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path());
        storage.ensure_dirs().unwrap();
        let source = storage.full_path("images/wide_1.png");
        write_png(&source, 640, 480);

        let relative = manager(&storage).generate(&source).unwrap();
        assert_eq!(relative, "thumbnails/wide_1_thumb.jpg");

        let thumb = image::open(storage.full_path(&relative)).unwrap();
        assert_eq!(thumb.dimensions(), (300, 300));
    }

    #[test]
    fn test_small_images_are_not_enlarged() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path());
        storage.ensure_dirs().unwrap();
        let source = storage.full_path("images/tiny.png");
        write_png(&source, 120, 80);

        let relative = manager(&storage).generate(&source).unwrap();
        let thumb = image::open(storage.full_path(&relative)).unwrap();
        assert_eq!(thumb.dimensions(), (120, 80));
    }

    #[test]
    fn test_existing_thumbnail_is_reused() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path());
        storage.ensure_dirs().unwrap();
        let source = storage.full_path("images/photo.png");
        write_png(&source, 400, 400);

        let existing = storage.full_path("thumbnails/photo_thumb.jpg");
        fs::write(&existing, b"already here").unwrap();

        let relative = manager(&storage).generate(&source).unwrap();
        assert_eq!(relative, "thumbnails/photo_thumb.jpg");
        assert_eq!(fs::read(&existing).unwrap(), b"already here");
    }

    #[test]
    fn test_failures_yield_none() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path());
        storage.ensure_dirs().unwrap();
        let thumbs = manager(&storage);

        assert!(thumbs.generate(&storage.full_path("images/missing.jpg")).is_none());

        let corrupt = storage.full_path("images/corrupt.jpg");
        fs::write(&corrupt, b"not an image").unwrap();
        assert!(thumbs.generate(&corrupt).is_none());
        assert!(!storage.full_path("thumbnails/corrupt_thumb.jpg").exists());
    }

    #[test]
    fn test_orientation_swaps_dimensions() {
        let img = DynamicImage::ImageRgb8(RgbImage::new(40, 10));
        assert_eq!(apply_orientation(img.clone(), 6).dimensions(), (10, 40));
        assert_eq!(apply_orientation(img.clone(), 3).dimensions(), (40, 10));
        assert_eq!(apply_orientation(img, 1).dimensions(), (40, 10));
    }

    #[test]
    fn test_generate_missing_records_paths() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(dir.path());
        storage.ensure_dirs().unwrap();
        let catalog = Catalog::open_in_memory().unwrap();

        write_png(&storage.full_path("images/a_1.png"), 500, 500);
        let with_file = catalog
            .insert_image(&NewImage {
                original_path: "/src/a.png",
                stored_path: "images/a_1.png",
                thumbnail_path: None,
                filename: "a",
                extension: ".png",
                imported_from: ImportSource::Local,
            })
            .unwrap();
        let without_file = catalog
            .insert_image(&NewImage {
                original_path: "/src/b.png",
                stored_path: "images/b_2.png",
                thumbnail_path: None,
                filename: "b",
                extension: ".png",
                imported_from: ImportSource::Local,
            })
            .unwrap();

        let generated = manager(&storage).generate_missing(&catalog).unwrap();
        assert_eq!(generated, 1);

        let image = catalog.get_image(with_file).unwrap().unwrap();
        assert_eq!(image.thumbnail_path.as_deref(), Some("thumbnails/a_1_thumb.jpg"));
        let image = catalog.get_image(without_file).unwrap().unwrap();
        assert!(image.thumbnail_path.is_none());
    }
}
