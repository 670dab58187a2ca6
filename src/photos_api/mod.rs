//! External photo library access: OAuth authorization plus listing and
//! downloading remote media items.

pub mod client;
pub mod oauth;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

pub use client::GooglePhotosClient;
pub use oauth::{authorize, Credentials, Tokens, CREDENTIALS_FILE, TOKENS_FILE};

/// A remote media item as returned by the library listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl MediaItem {
    /// Items without a MIME type are assumed to be images.
    pub fn is_image(&self) -> bool {
        self.mime_type
            .as_deref()
            .map_or(true, |mime| mime.starts_with("image/"))
    }

    /// Basename of the remote filename, so a name carrying `/` never
    /// becomes a nested path.
    pub fn display_name(&self) -> String {
        let basename = self
            .filename
            .as_deref()
            .and_then(|name| Path::new(name).file_name())
            .map(|name| name.to_string_lossy().to_string());
        match basename {
            Some(name) if !name.trim().is_empty() => name,
            _ => format!("google_photo_{}.jpg", self.id),
        }
    }
}

/// A remote library that imports can pull from.
pub trait PhotoSource: Send + Sync {
    /// Fail with a configuration error when credentials or tokens are missing.
    fn ensure_authenticated(&self) -> Result<()>;

    /// List remote items, capped at the configured ceiling.
    fn list_media_items(&self) -> Result<Vec<MediaItem>>;

    /// Fetch the original bytes of `item` into `dest`.
    fn download(&self, item: &MediaItem, dest: &Path) -> Result<()>;
}
