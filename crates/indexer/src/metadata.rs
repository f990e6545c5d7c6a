//! Descriptive metadata for items (titles and thumbnails).
//!
//! Each content type has its own source: the YouTube Data API for `yt:` cids
//! and the article page's Open Graph tags for `decrypt:` cids. Both cache
//! results in a store hash so repeated digests do not refetch.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use songchart_core::{Cid, CidKind};
use std::time::Duration;
use tracing::debug;

use crate::storage::{keys, Storage};

/// Default YouTube Data API v3 base URL.
pub const DEFAULT_YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";

/// Default Decrypt site base URL; articles live at `{base}/{slug}`.
pub const DEFAULT_DECRYPT_BASE: &str = "https://decrypt.co";

const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Human-facing description of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMetadata {
    /// Title shown in digests.
    pub title: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Preview image, if the source provides one.
    #[serde(default)]
    pub thumbnail_url: Option<String>,
}

/// Source of item metadata.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Look up metadata for `cid`.
    async fn fetch(&self, cid: &Cid) -> Result<ItemMetadata>;
}

/// YouTube video metadata, cached in the `youtube-videos` hash by video id.
#[derive(Clone)]
pub struct YoutubeMetadata {
    client: Client,
    api_base: String,
    api_key: String,
    storage: Storage,
}

impl YoutubeMetadata {
    /// Build a client against the public API.
    pub fn new(api_key: String, storage: Storage) -> Result<Self> {
        Self::with_api_base(DEFAULT_YOUTUBE_API_BASE.to_string(), api_key, storage)
    }

    /// Build a client against a custom API base URL.
    pub fn with_api_base(api_base: String, api_key: String, storage: Storage) -> Result<Self> {
        Ok(Self {
            client: http_client().context("Failed to build YouTube HTTP client")?,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            storage,
        })
    }

    async fn fetch_video(&self, video_id: &str) -> Result<ItemMetadata> {
        let url = format!("{}/videos", self.api_base);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("id", video_id),
                ("part", "snippet"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .with_context(|| format!("Failed to request video {}", video_id))?
            .error_for_status()
            .with_context(|| format!("YouTube API rejected request for video {}", video_id))?;

        let body: VideoListResponse = response
            .json()
            .await
            .with_context(|| format!("Malformed YouTube response for video {}", video_id))?;

        body.into_metadata()
            .with_context(|| format!("Video {} not found", video_id))
    }
}

#[async_trait]
impl MetadataSource for YoutubeMetadata {
    async fn fetch(&self, cid: &Cid) -> Result<ItemMetadata> {
        let video_id = match cid.kind() {
            CidKind::Youtube { video_id } => video_id,
            other => anyhow::bail!("No metadata source for {} ({:?})", cid, other),
        };

        if let Some(metadata) = cached(&self.storage, keys::YOUTUBE_METADATA, &video_id).await? {
            return Ok(metadata);
        }

        debug!("Fetching YouTube metadata for {}", video_id);
        let metadata = self.fetch_video(&video_id).await?;
        store(&self.storage, keys::YOUTUBE_METADATA, &video_id, &metadata).await?;

        Ok(metadata)
    }
}

/// Decrypt article metadata scraped from Open Graph tags, cached in the
/// `decrypt-articles` hash by article slug.
#[derive(Clone)]
pub struct DecryptMetadata {
    client: Client,
    base_url: String,
    storage: Storage,
}

impl DecryptMetadata {
    /// Build a client against the public site.
    pub fn new(storage: Storage) -> Result<Self> {
        Self::with_base_url(DEFAULT_DECRYPT_BASE.to_string(), storage)
    }

    /// Build a client against a custom site base URL.
    pub fn with_base_url(base_url: String, storage: Storage) -> Result<Self> {
        Ok(Self {
            client: http_client().context("Failed to build Decrypt HTTP client")?,
            base_url: base_url.trim_end_matches('/').to_string(),
            storage,
        })
    }

    async fn fetch_article(&self, article_id: &str) -> Result<ItemMetadata> {
        let url = format!("{}/{}", self.base_url, article_id);
        let page = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to request article {}", article_id))?
            .error_for_status()
            .with_context(|| format!("Decrypt rejected request for article {}", article_id))?
            .text()
            .await
            .with_context(|| format!("Failed to read article {}", article_id))?;

        parse_article(&page).with_context(|| format!("Article {} has no og:title", article_id))
    }
}

#[async_trait]
impl MetadataSource for DecryptMetadata {
    async fn fetch(&self, cid: &Cid) -> Result<ItemMetadata> {
        let article_id = match cid.kind() {
            CidKind::Decrypt { article_id } => article_id,
            other => anyhow::bail!("No metadata source for {} ({:?})", cid, other),
        };

        if let Some(metadata) = cached(&self.storage, keys::DECRYPT_METADATA, &article_id).await? {
            return Ok(metadata);
        }

        debug!("Fetching Decrypt metadata for {}", article_id);
        let metadata = self.fetch_article(&article_id).await?;
        store(&self.storage, keys::DECRYPT_METADATA, &article_id, &metadata).await?;

        Ok(metadata)
    }
}

fn http_client() -> reqwest::Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .user_agent("songchart-indexer/metadata")
        .build()
}

async fn cached(storage: &Storage, cache: &str, id: &str) -> Result<Option<ItemMetadata>> {
    let Some(json) = storage.hget(cache, id).await? else {
        return Ok(None);
    };
    let metadata = serde_json::from_str(&json)
        .with_context(|| format!("Corrupt cached metadata for {} in {}", id, cache))?;
    Ok(Some(metadata))
}

async fn store(storage: &Storage, cache: &str, id: &str, metadata: &ItemMetadata) -> Result<()> {
    let json = serde_json::to_string(metadata).context("Failed to serialize metadata")?;
    storage.hset(cache, id, &json).await
}

// Open Graph `content` of `<meta property="...">`
fn og_property(page: &Html, property: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"meta[property="{}"]"#, property)).ok()?;
    page.select(&selector)
        .find_map(|element| element.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

fn parse_article(html: &str) -> Option<ItemMetadata> {
    let page = Html::parse_document(html);

    Some(ItemMetadata {
        title: og_property(&page, "og:title")?,
        description: og_property(&page, "og:description").unwrap_or_default(),
        thumbnail_url: og_property(&page, "og:image"),
    })
}

// `videos.list` response, reduced to what digests show
#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl VideoListResponse {
    fn into_metadata(self) -> Option<ItemMetadata> {
        let video = self.items.into_iter().next()?;
        let Snippet {
            title,
            description,
            thumbnails,
        } = video.snippet;

        Some(ItemMetadata {
            title,
            description,
            thumbnail_url: thumbnails.medium.or(thumbnails.default).map(|t| t.url),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::setup_storage;

    #[test]
    fn test_parse_video_list() {
        let body = r#"{
            "kind": "youtube#videoListResponse",
            "items": [{
                "id": "abc12345678",
                "snippet": {
                    "title": "Some Song",
                    "description": "Live at the venue",
                    "thumbnails": {
                        "default": {"url": "https://i.ytimg.com/vi/abc12345678/default.jpg"},
                        "medium": {"url": "https://i.ytimg.com/vi/abc12345678/mqdefault.jpg", "width": 320}
                    }
                }
            }]
        }"#;

        let parsed: VideoListResponse = serde_json::from_str(body).unwrap();
        let metadata = parsed.into_metadata().unwrap();
        assert_eq!(metadata.title, "Some Song");
        assert_eq!(metadata.description, "Live at the venue");
        assert_eq!(
            metadata.thumbnail_url.as_deref(),
            Some("https://i.ytimg.com/vi/abc12345678/mqdefault.jpg")
        );
    }

    #[test]
    fn test_empty_video_list_is_not_found() {
        let parsed: VideoListResponse = serde_json::from_str(r#"{"items": []}"#).unwrap();
        assert!(parsed.into_metadata().is_none());
    }

    #[tokio::test]
    async fn test_cached_metadata_skips_api() {
        let (storage, _temp_db) = setup_storage().await;

        let cached = ItemMetadata {
            title: "Cached Song".to_string(),
            description: String::new(),
            thumbnail_url: None,
        };
        storage
            .hset(
                keys::YOUTUBE_METADATA,
                "abc12345678",
                &serde_json::to_string(&cached).unwrap(),
            )
            .await
            .unwrap();

        // Unroutable API base: only the cache can answer.
        let source = YoutubeMetadata::with_api_base(
            "http://127.0.0.1:9".to_string(),
            "test-key".to_string(),
            storage.clone(),
        )
        .unwrap();

        let metadata = source.fetch(&Cid::from_text("yt:abc12345678")).await.unwrap();
        assert_eq!(metadata, cached);

        assert!(source
            .fetch(&Cid::from_text("decrypt:some-article"))
            .await
            .is_err());

        storage.close().await;
    }

    #[test]
    fn test_parse_article_open_graph() {
        let page = r#"<!DOCTYPE html>
            <html><head>
                <meta property="og:type" content="article">
                <meta property="og:title" content="Bitcoin hits new high">
                <meta property="og:description" content="Markets react.">
                <meta property="og:image" content="https://cdn.decrypt.co/cover.jpg">
                <title>ignored</title>
            </head><body></body></html>"#;

        let metadata = parse_article(page).unwrap();
        assert_eq!(metadata.title, "Bitcoin hits new high");
        assert_eq!(metadata.description, "Markets react.");
        assert_eq!(
            metadata.thumbnail_url.as_deref(),
            Some("https://cdn.decrypt.co/cover.jpg")
        );
    }

    #[test]
    fn test_parse_article_without_title() {
        let page = r#"<html><head><meta property="og:image" content="x.jpg"></head></html>"#;
        assert!(parse_article(page).is_none());
    }

    #[tokio::test]
    async fn test_cached_article_skips_site() {
        let (storage, _temp_db) = setup_storage().await;

        let cached = ItemMetadata {
            title: "Cached Article".to_string(),
            description: "From the cache".to_string(),
            thumbnail_url: Some("https://cdn.decrypt.co/cover.jpg".to_string()),
        };
        storage
            .hset(
                keys::DECRYPT_METADATA,
                "some-article",
                &serde_json::to_string(&cached).unwrap(),
            )
            .await
            .unwrap();

        // Unroutable site: only the cache can answer.
        let source =
            DecryptMetadata::with_base_url("http://127.0.0.1:9".to_string(), storage.clone())
                .unwrap();

        let metadata = source
            .fetch(&Cid::from_text("decrypt:some-article"))
            .await
            .unwrap();
        assert_eq!(metadata, cached);

        assert!(source
            .fetch(&Cid::from_text("yt:abc12345678"))
            .await
            .is_err());

        storage.close().await;
    }
}
