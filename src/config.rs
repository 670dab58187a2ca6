use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root of managed storage. Holds the catalog, `images/` and `thumbnails/`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default)]
    pub thumbnails: ThumbnailConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub google_photos: GooglePhotosConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThumbnailConfig {
    /// Edge of the square box thumbnails are cropped to.
    #[serde(default = "default_thumb_size")]
    pub size: u32,

    /// JPEG quality (1-100).
    #[serde(default = "default_thumb_quality")]
    pub quality: u8,
}

fn default_thumb_size() -> u32 {
    300
}

fn default_thumb_quality() -> u8 {
    85
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            size: default_thumb_size(),
            quality: default_thumb_quality(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Extensions picked up by folder import (case-insensitive, no dot).
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "gif".to_string(),
        "bmp".to_string(),
        "webp".to_string(),
    ]
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GooglePhotosConfig {
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    #[serde(default = "default_token_url")]
    pub token_url: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Items requested per listing page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Ceiling on items fetched in a single import run.
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Launch a browser for the consent screen; otherwise only log the URL.
    #[serde(default = "default_open_browser")]
    pub open_browser: bool,

    /// Browser launcher (e.g., "firefox"). Defaults to xdg-open / open.
    #[serde(default)]
    pub browser_command: Option<String>,
}

fn default_auth_url() -> String {
    "https://accounts.google.com/o/oauth2/v2/auth".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_api_base_url() -> String {
    "https://photoslibrary.googleapis.com/v1".to_string()
}

fn default_page_size() -> u32 {
    50
}

fn default_max_items() -> usize {
    1000
}

fn default_open_browser() -> bool {
    true
}

impl Default for GooglePhotosConfig {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            api_base_url: default_api_base_url(),
            page_size: default_page_size(),
            max_items: default_max_items(),
            open_browser: default_open_browser(),
            browser_command: None,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("shoebox")
        .join("data")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            thumbnails: ThumbnailConfig::default(),
            import: ImportConfig::default(),
            google_photos: GooglePhotosConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location, writing a default config on first run.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            let config: Config = toml::from_str(&content)
                .with_context(|| format!("Failed to parse config {}", path.display()))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Catalog database file inside the data directory.
    pub fn catalog_path(&self) -> PathBuf {
        self.data_dir.join("database.db")
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("shoebox")
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("SHOEBOX_CONFIG") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            data_dir = "/tmp/shoebox-data"

            [thumbnails]
            size = 128
            "#,
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/shoebox-data"));
        assert_eq!(config.thumbnails.size, 128);
        assert_eq!(config.thumbnails.quality, 85);
        assert_eq!(config.google_photos.max_items, 1000);
        assert!(config.import.image_extensions.contains(&"webp".to_string()));
        assert_eq!(
            config.catalog_path(),
            PathBuf::from("/tmp/shoebox-data/database.db")
        );
    }

    #[test]
    fn test_load_from_missing_file_writes_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.thumbnails.size, 300);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.google_photos.page_size, 50);
    }
}
