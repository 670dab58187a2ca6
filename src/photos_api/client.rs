use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::oauth::{self, Credentials, Tokens};
use super::{MediaItem, PhotoSource};
use crate::config::GooglePhotosConfig;
use crate::error::{Error, Result};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    page_token: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    media_items: Vec<MediaItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Photo library client backed by the credential and token files in the
/// data directory.
pub struct GooglePhotosClient {
    config: GooglePhotosConfig,
    data_dir: PathBuf,
    agent: ureq::Agent,
}

impl GooglePhotosClient {
    pub fn new(config: GooglePhotosConfig, data_dir: impl Into<PathBuf>) -> Self {
        // No timeouts beyond ureq's own defaults.
        let agent = ureq::AgentBuilder::new().build();
        Self {
            config,
            data_dir: data_dir.into(),
            agent,
        }
    }

    /// A usable access token, refreshed and re-saved when expired.
    fn access_token(&self) -> Result<String> {
        let credentials = Credentials::load(&self.data_dir)?;
        let tokens = Tokens::load(&self.data_dir)?;

        if !tokens.is_expired(chrono::Utc::now().timestamp_millis()) {
            return Ok(tokens.access_token);
        }

        info!("Access token expired, refreshing");
        let refreshed = oauth::refresh(&self.config, &credentials, &tokens)?;
        refreshed.save(&self.data_dir)?;
        Ok(refreshed.access_token)
    }

    fn search_page(&self, token: &str, page_token: Option<&str>) -> Result<SearchResponse> {
        let url = format!(
            "{}/mediaItems:search",
            self.config.api_base_url.trim_end_matches('/')
        );
        let request = SearchRequest {
            page_size: self.config.page_size,
            page_token,
        };

        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .set("Authorization", &format!("Bearer {}", token))
            .send_json(&request)
            .map_err(|e| Error::External(format!("Media listing failed: {}", e)))?;

        response
            .into_json()
            .map_err(|e| Error::External(format!("Failed to parse media listing: {}", e)))
    }
}

impl PhotoSource for GooglePhotosClient {
    fn ensure_authenticated(&self) -> Result<()> {
        self.access_token().map(|_| ())
    }

    /// Page through the library until it runs out or `max_items` is reached.
    ///
    /// A failure on the first page is returned. Later page failures stop
    /// the listing and keep what was already fetched.
    fn list_media_items(&self) -> Result<Vec<MediaItem>> {
        let token = self.access_token()?;
        let mut items: Vec<MediaItem> = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page = match self.search_page(&token, page_token.as_deref()) {
                Ok(page) => page,
                Err(e) if items.is_empty() && page_token.is_none() => return Err(e),
                Err(e) => {
                    warn!("Error fetching media items: {}", e);
                    break;
                }
            };

            items.extend(page.media_items);
            page_token = page.next_page_token.filter(|t| !t.is_empty());
            debug!("Fetched {} media items so far", items.len());

            if page_token.is_none() || items.len() >= self.config.max_items {
                break;
            }
        }

        items.truncate(self.config.max_items);
        Ok(items)
    }

    fn download(&self, item: &MediaItem, dest: &Path) -> Result<()> {
        let base_url = item
            .base_url
            .as_deref()
            .ok_or_else(|| Error::External("Media item does not have a baseUrl".to_string()))?;

        // `=d` asks for the original bytes instead of a resized rendition.
        let url = format!("{}=d", base_url);
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| Error::External(format!("Failed to download {}: {}", item.id, e)))?;

        if response.status() != 200 {
            return Err(Error::External(format!(
                "Failed to download: {}",
                response.status()
            )));
        }

        let parent = dest.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        io::copy(&mut response.into_reader(), tmp.as_file_mut())?;
        tmp.persist(dest).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}
