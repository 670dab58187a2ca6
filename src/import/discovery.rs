use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::{Error, Result};

/// Recursively collect files under `folder` whose extension is in
/// `extensions` (case-insensitive), sorted by path.
pub fn discover_images(folder: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        return Err(Error::validation(format!(
            "Not a folder: {}",
            folder.display()
        )));
    }

    let mut images = Vec::new();

    for entry in WalkDir::new(folder)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() {
            continue;
        }

        if let Some(ext) = path.extension() {
            let ext = ext.to_string_lossy().to_lowercase();
            if extensions
                .iter()
                .any(|e| e.trim_start_matches('.').to_lowercase() == ext)
            {
                images.push(path.to_path_buf());
            }
        }
    }

    images.sort();
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use tempfile::tempdir;

    #[test]
    fn test_discover_images_recurses_and_filters() {
        let dir = tempdir().unwrap();

        File::create(dir.path().join("b.JPG")).unwrap();
        File::create(dir.path().join("a.png")).unwrap();
        File::create(dir.path().join("notes.txt")).unwrap();
        fs::create_dir(dir.path().join("trip")).unwrap();
        File::create(dir.path().join("trip/c.jpeg")).unwrap();
        fs::create_dir(dir.path().join("folder.jpg")).unwrap();

        let extensions = vec!["jpg".to_string(), ".jpeg".to_string(), "png".to_string()];
        let images = discover_images(dir.path(), &extensions).unwrap();

        assert_eq!(
            images,
            vec![
                dir.path().join("a.png"),
                dir.path().join("b.JPG"),
                dir.path().join("trip/c.jpeg"),
            ]
        );
    }

    #[test]
    fn test_missing_folder_is_rejected() {
        let dir = tempdir().unwrap();
        let err = discover_images(&dir.path().join("nope"), &["jpg".to_string()]).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }
}
