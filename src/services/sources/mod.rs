//! Bibliographic metadata sources.
//!
//! Each source looks a book up by ISBN and answers with metadata, an
//! explicit "no match", or a [`SourceError`]. The resolver decides what to
//! retry; sources never retry on their own.

mod google_books;
mod open_library;
mod openbd;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::{BookMetadata, Isbn, ResolverConfig};
use crate::utils::http::{create_provider_client, redact};

pub use google_books::GoogleBooksSource;
pub use open_library::OpenLibrarySource;
pub use openbd::OpenBdSource;

/// Failure of a single source call.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("request rejected with status {0}")]
    Rejected(u16),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl SourceError {
    /// Whether another attempt against the same source may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SourceError::Timeout | SourceError::Transport(_))
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SourceError::Timeout
        } else {
            SourceError::Transport(e.to_string())
        }
    }
}

/// A bibliographic provider.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    /// Provider name used in configuration and logs.
    fn name(&self) -> &str;

    /// Look up one ISBN. `Ok(None)` is a well-formed "no match".
    async fn lookup(&self, isbn: &Isbn) -> std::result::Result<Option<BookMetadata>, SourceError>;
}

/// GET a URL and decode its JSON body. A 404 is a "no match".
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    client: &Client,
    url: Url,
) -> std::result::Result<Option<T>, SourceError> {
    log::debug!("GET {}", redact(url.as_str()));
    let response = client.get(url).send().await?;
    let status = response.status();

    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        return Err(SourceError::Transport(format!("status {status}")));
    }
    if !status.is_success() {
        return Err(SourceError::Rejected(status.as_u16()));
    }

    let body = response.text().await?;
    serde_json::from_str(&body)
        .map(Some)
        .map_err(|e| SourceError::Malformed(e.to_string()))
}

/// Build the configured provider chain, in order.
pub fn build_sources(config: &ResolverConfig) -> Result<Vec<Arc<dyn MetadataSource>>> {
    let client = create_provider_client(config)?;
    config
        .providers
        .iter()
        .map(|name| source_by_name(name, client.clone(), config))
        .collect()
}

fn source_by_name(
    name: &str,
    client: Client,
    config: &ResolverConfig,
) -> Result<Arc<dyn MetadataSource>> {
    let source: Arc<dyn MetadataSource> = match name.trim() {
        "google_books" => Arc::new(GoogleBooksSource::new(
            client,
            config.google_books_api_key.clone(),
        )),
        "openbd" => Arc::new(OpenBdSource::new(client)),
        "open_library" => Arc::new(OpenLibrarySource::new(client)),
        other => {
            return Err(AppError::config(format!(
                "unknown metadata provider '{other}'"
            )));
        }
    };
    Ok(source)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Answer a single HTTP request on a loopback port with `status` and a
    /// JSON `body`. Returns the base URL to point a source at.
    pub(crate) async fn serve_once(status: u16, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status} Canned\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}/lookup")
    }

    fn isbn() -> Isbn {
        Isbn::parse("9780000000001").unwrap()
    }

    #[tokio::test]
    async fn test_not_found_status_is_no_match() {
        let base = serve_once(404, "{}").await;
        let source = OpenLibrarySource::new(Client::new()).with_base_url(base);
        assert!(source.lookup(&isbn()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let base = serve_once(503, "{}").await;
        let source = OpenBdSource::new(Client::new()).with_base_url(base);
        let err = source.lookup(&isbn()).await.unwrap_err();
        assert!(err.is_retryable(), "{err}");
    }

    #[tokio::test]
    async fn test_forbidden_is_rejected() {
        let base = serve_once(403, "{}").await;
        let source = GoogleBooksSource::new(Client::new(), None).with_base_url(base);
        assert!(matches!(
            source.lookup(&isbn()).await,
            Err(SourceError::Rejected(403))
        ));
    }

    #[tokio::test]
    async fn test_garbled_body_is_malformed() {
        let base = serve_once(200, "<html>").await;
        let source = OpenBdSource::new(Client::new()).with_base_url(base);
        assert!(matches!(
            source.lookup(&isbn()).await,
            Err(SourceError::Malformed(_))
        ));
    }

    #[test]
    fn test_build_sources_keeps_order() {
        let config = ResolverConfig {
            providers: vec!["openbd".into(), "google_books".into()],
            ..ResolverConfig::default()
        };
        let names: Vec<String> = build_sources(&config)
            .unwrap()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        assert_eq!(names, vec!["openbd", "google_books"]);
    }

    #[test]
    fn test_unknown_provider_is_config_error() {
        let config = ResolverConfig {
            providers: vec!["amazon".into()],
            ..ResolverConfig::default()
        };
        assert!(matches!(build_sources(&config), Err(AppError::Config(_))));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(SourceError::Timeout.is_retryable());
        assert!(SourceError::Transport("reset".into()).is_retryable());
        assert!(!SourceError::Rejected(403).is_retryable());
        assert!(!SourceError::Malformed("eof".into()).is_retryable());
    }
}
