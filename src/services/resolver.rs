// src/services/resolver.rs

//! Metadata resolver.
//!
//! Walks an ordered chain of [`MetadataSource`]s. The first source with
//! usable data wins and later sources are never asked. Each attempt is
//! bounded by a timeout; timeouts and transport failures are retried up to
//! `max_attempts` per source, while a clean "no match" (or a response the
//! source could not make sense of) moves on immediately.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{BookMetadata, Isbn, ResolverConfig};
use crate::services::sources::{MetadataSource, SourceError, build_sources};

/// Outcome of a resolution. `NotFound` is a normal answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Resolution {
    Found {
        metadata: BookMetadata,
        /// Name of the source (or `catalog`) that answered
        source: String,
    },
    NotFound,
}

impl Resolution {
    pub fn metadata(&self) -> Option<&BookMetadata> {
        match self {
            Resolution::Found { metadata, .. } => Some(metadata),
            Resolution::NotFound => None,
        }
    }

    pub fn into_metadata(self) -> Option<BookMetadata> {
        match self {
            Resolution::Found { metadata, .. } => Some(metadata),
            Resolution::NotFound => None,
        }
    }
}

/// Discovery-mode resolver over external providers.
pub struct MetadataResolver {
    sources: Vec<Arc<dyn MetadataSource>>,
    timeout: Duration,
    max_attempts: usize,
}

impl MetadataResolver {
    pub fn new(sources: Vec<Arc<dyn MetadataSource>>, timeout: Duration, max_attempts: usize) -> Self {
        Self {
            sources,
            timeout,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Build the provider chain described by configuration.
    pub fn from_config(config: &ResolverConfig) -> Result<Self> {
        let sources = build_sources(config)?;
        if sources.is_empty() {
            return Err(AppError::config("no metadata providers configured"));
        }
        Ok(Self::new(sources, config.timeout(), config.max_attempts))
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Resolve an ISBN against the provider chain.
    pub async fn discover(&self, isbn: &Isbn) -> Resolution {
        for source in &self.sources {
            if let Some(metadata) = self.query(source.as_ref(), isbn).await {
                log::info!("Resolved {} via {}", isbn, source.name());
                return Resolution::Found {
                    metadata,
                    source: source.name().to_string(),
                };
            }
        }
        log::info!("No provider had metadata for {}", isbn);
        Resolution::NotFound
    }

    /// Query one source under the retry policy. `None` means exhausted.
    async fn query(&self, source: &dyn MetadataSource, isbn: &Isbn) -> Option<BookMetadata> {
        for attempt in 1..=self.max_attempts {
            let outcome = match tokio::time::timeout(self.timeout, source.lookup(isbn)).await {
                Ok(result) => result,
                Err(_) => Err(SourceError::Timeout),
            };

            match outcome {
                Ok(Some(metadata)) => return Some(metadata),
                Ok(None) => {
                    log::debug!("{}: no match for {}", source.name(), isbn);
                    return None;
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    log::warn!(
                        "{}: attempt {}/{} for {} failed: {}; retrying",
                        source.name(),
                        attempt,
                        self.max_attempts,
                        isbn,
                        e
                    );
                }
                Err(e) => {
                    log::warn!(
                        "{}: giving up on {} after attempt {}: {}",
                        source.name(),
                        isbn,
                        attempt,
                        e
                    );
                    return None;
                }
            }
        }
        None
    }
}
