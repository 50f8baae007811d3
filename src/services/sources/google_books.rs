//! Google Books volumes API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::models::{BookMetadata, Isbn};
use crate::services::sources::{MetadataSource, SourceError, fetch_json};
use crate::utils::http::url_with_query;

const BASE_URL: &str = "https://www.googleapis.com/books/v1/volumes";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumesResponse {
    #[serde(default)]
    total_items: u32,
    #[serde(default)]
    items: Vec<Volume>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Volume {
    #[serde(default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    subtitle: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    published_date: Option<String>,
    image_links: Option<ImageLinks>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageLinks {
    thumbnail: Option<String>,
    small_thumbnail: Option<String>,
}

/// Google Books lookup by `isbn:` query.
pub struct GoogleBooksSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl GoogleBooksSource {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
            api_key,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

fn into_metadata(isbn: &Isbn, response: VolumesResponse) -> Option<BookMetadata> {
    if response.total_items == 0 {
        return None;
    }
    let info = response.items.into_iter().next()?.volume_info;

    let title = match (info.title, info.subtitle) {
        (Some(t), Some(s)) if !s.trim().is_empty() => Some(format!("{t}: {s}")),
        (t, _) => t,
    };
    let thumbnail = info
        .image_links
        .and_then(|links| links.thumbnail.or(links.small_thumbnail))
        .map(|url| url.replacen("http://", "https://", 1));

    Some(BookMetadata::from_partial(
        isbn.clone(),
        title,
        info.authors,
        info.published_date,
        thumbnail,
    ))
}

#[async_trait]
impl MetadataSource for GoogleBooksSource {
    fn name(&self) -> &str {
        "google_books"
    }

    async fn lookup(&self, isbn: &Isbn) -> Result<Option<BookMetadata>, SourceError> {
        let query = format!("isbn:{isbn}");
        let mut params = vec![("q", query.as_str())];
        if let Some(key) = self.api_key.as_deref() {
            params.push(("key", key));
        }
        let url = url_with_query(&self.base_url, &params)
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let response: Option<VolumesResponse> = fetch_json(&self.client, url).await?;
        Ok(response.and_then(|r| into_metadata(isbn, r)))
    }
}
