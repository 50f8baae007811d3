//! Open Library books API.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::models::{BookMetadata, Isbn};
use crate::services::sources::{MetadataSource, SourceError, fetch_json};
use crate::utils::http::url_with_query;

const BASE_URL: &str = "https://openlibrary.org/api/books";

#[derive(Debug, Deserialize)]
struct Book {
    title: Option<String>,
    #[serde(default)]
    authors: Vec<Author>,
    publish_date: Option<String>,
    cover: Option<Cover>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Cover {
    small: Option<String>,
    medium: Option<String>,
}

/// Open Library lookup by bibkey.
pub struct OpenLibrarySource {
    client: Client,
    base_url: String,
}

impl OpenLibrarySource {
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

fn bibkey(isbn: &Isbn) -> String {
    format!("ISBN:{isbn}")
}

fn into_metadata(isbn: &Isbn, mut books: HashMap<String, Book>) -> Option<BookMetadata> {
    let book = books.remove(&bibkey(isbn))?;
    Some(BookMetadata::from_partial(
        isbn.clone(),
        book.title,
        book.authors.into_iter().map(|a| a.name).collect(),
        book.publish_date,
        book.cover.and_then(|c| c.medium.or(c.small)),
    ))
}

#[async_trait]
impl MetadataSource for OpenLibrarySource {
    fn name(&self) -> &str {
        "open_library"
    }

    async fn lookup(&self, isbn: &Isbn) -> Result<Option<BookMetadata>, SourceError> {
        let key = bibkey(isbn);
        let url = url_with_query(
            &self.base_url,
            &[("bibkeys", key.as_str()), ("format", "json"), ("jscmd", "data")],
        )
        .map_err(|e| SourceError::Transport(e.to_string()))?;

        let books: Option<HashMap<String, Book>> = fetch_json(&self.client, url).await?;
        Ok(books.and_then(|b| into_metadata(isbn, b)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn isbn() -> Isbn {
        Isbn::parse("9780261103573").unwrap()
    }

    #[test]
    fn test_empty_object_is_no_match() {
        let books: HashMap<String, Book> = serde_json::from_str("{}").unwrap();
        assert!(into_metadata(&isbn(), books).is_none());
    }

    #[test]
    fn test_parse_book() {
        let body = r#"{
            "ISBN:9780261103573": {
                "title": "The Fellowship of the Ring",
                "authors": [{"url": "https://openlibrary.org/authors/OL26320A", "name": "J.R.R. Tolkien"}],
                "publish_date": "1991",
                "cover": {"small": "https://covers.openlibrary.org/b/id/1-S.jpg",
                          "medium": "https://covers.openlibrary.org/b/id/1-M.jpg"}
            }
        }"#;
        let books: HashMap<String, Book> = serde_json::from_str(body).unwrap();
        let meta = into_metadata(&isbn(), books).unwrap();
        assert_eq!(meta.title, "The Fellowship of the Ring");
        assert_eq!(meta.authors, vec!["J.R.R. Tolkien"]);
        assert_eq!(meta.published_date, "1991");
        assert_eq!(meta.thumbnail_url, "https://covers.openlibrary.org/b/id/1-M.jpg");
    }

    #[tokio::test]
    async fn test_lookup_over_http() {
        let body = r#"{"ISBN:9780261103573": {"title": "The Hobbit", "authors": [{"name": "J.R.R. Tolkien"}]}}"#;
        let base = crate::services::sources::tests::serve_once(200, body).await;
        let source = OpenLibrarySource::new(Client::new()).with_base_url(base);
        let meta = source.lookup(&isbn()).await.unwrap().unwrap();
        assert_eq!(meta.title, "The Hobbit");
        assert_eq!(meta.authors, vec!["J.R.R. Tolkien"]);
    }
}
