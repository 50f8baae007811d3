//! openBD, the Japanese publishers' bibliographic API.
//!
//! `GET /v1/get?isbn=...` answers with a JSON array holding one element
//! per requested ISBN; unknown ISBNs come back as `null`.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::models::{BookMetadata, Isbn};
use crate::services::sources::{MetadataSource, SourceError, fetch_json};
use crate::utils::http::url_with_query;

const BASE_URL: &str = "https://api.openbd.jp/v1/get";

#[derive(Debug, Deserialize)]
struct Record {
    summary: Summary,
}

#[derive(Debug, Deserialize)]
struct Summary {
    title: Option<String>,
    volume: Option<String>,
    author: Option<String>,
    pubdate: Option<String>,
    cover: Option<String>,
}

/// openBD lookup.
pub struct OpenBdSource {
    client: Client,
    base_url: String,
}

impl OpenBdSource {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Split an openBD author string such as `"夏目漱石／著 山田太郎／解説"`
/// into names, dropping the role suffixes.
fn split_authors(raw: &str) -> Vec<String> {
    raw.split_whitespace()
        .map(|part| part.split(['／', '/']).next().unwrap_or(part))
        .map(|name| name.trim_matches(',').to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

/// `20130401` → `2013-04-01`, `201304` → `2013-04`; anything else as-is.
fn format_pubdate(raw: &str) -> String {
    let raw = raw.trim();
    if raw.chars().all(|c| c.is_ascii_digit()) {
        match raw.len() {
            8 => return format!("{}-{}-{}", &raw[..4], &raw[4..6], &raw[6..]),
            6 => return format!("{}-{}", &raw[..4], &raw[4..]),
            _ => {}
        }
    }
    raw.to_string()
}

fn into_metadata(isbn: &Isbn, records: Vec<Option<Record>>) -> Option<BookMetadata> {
    let summary = records.into_iter().flatten().next()?.summary;

    let title = match (summary.title, summary.volume) {
        (Some(t), Some(v)) if !v.trim().is_empty() => Some(format!("{t} {v}")),
        (t, _) => t,
    };

    Some(BookMetadata::from_partial(
        isbn.clone(),
        title,
        summary.author.as_deref().map(split_authors).unwrap_or_default(),
        summary.pubdate.as_deref().map(format_pubdate),
        summary.cover,
    ))
}

#[async_trait]
impl MetadataSource for OpenBdSource {
    fn name(&self) -> &str {
        "openbd"
    }

    async fn lookup(&self, isbn: &Isbn) -> Result<Option<BookMetadata>, SourceError> {
        let url = url_with_query(&self.base_url, &[("isbn", isbn.as_str())])
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let records: Option<Vec<Option<Record>>> = fetch_json(&self.client, url).await?;
        Ok(records.and_then(|r| into_metadata(isbn, r)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NO_THUMBNAIL_URL;

    fn isbn() -> Isbn {
        Isbn::parse("9784101010014").unwrap()
    }

    #[test]
    fn test_null_record_is_no_match() {
        let records: Vec<Option<Record>> = serde_json::from_str("[null]").unwrap();
        assert!(into_metadata(&isbn(), records).is_none());
    }

    #[test]
    fn test_parse_summary() {
        let body = r#"[{
            "onix": {},
            "summary": {
                "isbn": "9784101010014",
                "title": "こころ",
                "volume": "",
                "series": "新潮文庫",
                "publisher": "新潮社",
                "pubdate": "20040301",
                "cover": "",
                "author": "夏目漱石／著"
            }
        }]"#;
        let records: Vec<Option<Record>> = serde_json::from_str(body).unwrap();
        let meta = into_metadata(&isbn(), records).unwrap();
        assert_eq!(meta.title, "こころ");
        assert_eq!(meta.authors, vec!["夏目漱石"]);
        assert_eq!(meta.published_date, "2004-03-01");
        assert_eq!(meta.thumbnail_url, NO_THUMBNAIL_URL);
    }

    #[test]
    fn test_split_authors_drops_roles() {
        assert_eq!(
            split_authors("村上春樹／著 柴田元幸／訳"),
            vec!["村上春樹", "柴田元幸"]
        );
        assert!(split_authors("  ").is_empty());
    }

    #[test]
    fn test_format_pubdate() {
        assert_eq!(format_pubdate("201304"), "2013-04");
        assert_eq!(format_pubdate("c2013"), "c2013");
    }
}
