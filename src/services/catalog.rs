// src/services/catalog.rs

//! The organization's catalog: the list of titles it owns.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::models::{BookMetadata, CatalogEntry, Isbn};
use crate::services::resolver::Resolution;
use crate::storage::TableStore;
use crate::utils::with_timeout;

/// Source name reported when the catalog answers a resolution.
pub const CATALOG_SOURCE: &str = "catalog";

/// Catalog table accessor.
pub struct Catalog {
    store: Arc<dyn TableStore>,
    table: String,
    timeout: Duration,
}

impl Catalog {
    pub fn new(store: Arc<dyn TableStore>, table: impl Into<String>, timeout: Duration) -> Self {
        Self {
            store,
            table: table.into(),
            timeout,
        }
    }

    /// Every decodable entry, in registration order.
    pub async fn entries(&self) -> Result<Vec<CatalogEntry>> {
        let rows = with_timeout(self.timeout, self.store.read_all(&self.table)).await?;
        let entries = rows
            .into_iter()
            .filter_map(|row| match CatalogEntry::from_row(&row.cells) {
                Ok(entry) => Some(entry),
                Err(e) => {
                    log::warn!(
                        "Skipping unreadable {} row {}: {}",
                        self.table,
                        row.reference.0,
                        e
                    );
                    None
                }
            })
            .collect();
        Ok(entries)
    }

    /// Exact ISBN match.
    pub async fn find(&self, isbn: &Isbn) -> Result<Option<CatalogEntry>> {
        Ok(self.entries().await?.into_iter().find(|e| &e.isbn == isbn))
    }

    /// Confirmation-mode resolution: answer from the catalog only.
    pub async fn confirm(&self, isbn: &Isbn) -> Result<Resolution> {
        Ok(match self.find(isbn).await? {
            Some(entry) => Resolution::Found {
                metadata: BookMetadata {
                    isbn: entry.isbn,
                    title: entry.title,
                    authors: entry.authors,
                    published_date: entry.published_date,
                    thumbnail_url: entry.thumbnail_url,
                },
                source: CATALOG_SOURCE.to_string(),
            },
            None => Resolution::NotFound,
        })
    }

    /// Append a new entry. A duplicate ISBN is a conflict and nothing is
    /// written.
    pub async fn register(&self, metadata: BookMetadata, now: DateTime<Utc>) -> Result<CatalogEntry> {
        if self.find(&metadata.isbn).await?.is_some() {
            return Err(AppError::conflict(format!(
                "ISBN {} is already registered",
                metadata.isbn
            )));
        }
        let entry = CatalogEntry::new(metadata, now);
        with_timeout(self.timeout, self.store.append(&self.table, entry.to_row())).await?;
        log::info!("Registered {} \"{}\"", entry.isbn, entry.title);
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn metadata(isbn: &str, title: &str) -> BookMetadata {
        BookMetadata::from_partial(
            Isbn::parse(isbn).unwrap(),
            Some(title.into()),
            vec!["Author One".into(), "Author Two".into()],
            Some("2020".into()),
            None,
        )
    }

    fn catalog(store: Arc<MemoryStore>) -> Catalog {
        Catalog::new(store, "books", Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_register_then_confirm() {
        let store = Arc::new(MemoryStore::new());
        let catalog = catalog(store.clone());
        catalog
            .register(metadata("9780000000001", "Test Book"), Utc::now())
            .await
            .unwrap();

        let isbn = Isbn::parse("978-0-00-000000-1").unwrap();
        let resolution = catalog.confirm(&isbn).await.unwrap();
        let meta = resolution.metadata().unwrap();
        assert_eq!(meta.title, "Test Book");
        assert_eq!(meta.authors, vec!["Author One", "Author Two"]);
        assert!(matches!(resolution, Resolution::Found { ref source, .. } if source == CATALOG_SOURCE));
    }

    #[tokio::test]
    async fn test_duplicate_register_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let catalog = catalog(store.clone());
        catalog
            .register(metadata("9780000000001", "Test Book"), Utc::now())
            .await
            .unwrap();
        let again = catalog
            .register(metadata("9780000000001", "Other"), Utc::now())
            .await;

        assert!(matches!(again, Err(AppError::Conflict(_))));
        assert_eq!(store.rows("books").await.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_isbn_is_not_found() {
        let catalog = catalog(Arc::new(MemoryStore::new()));
        let isbn = Isbn::parse("9780000000002").unwrap();
        assert_eq!(catalog.confirm(&isbn).await.unwrap(), Resolution::NotFound);
    }

    #[tokio::test]
    async fn test_unreadable_rows_are_skipped() {
        let store = Arc::new(MemoryStore::new());
        store
            .append("books", vec!["id".into(), "".into(), "No ISBN".into()])
            .await
            .unwrap();
        let catalog = catalog(store.clone());
        catalog
            .register(metadata("9780000000001", "Test Book"), Utc::now())
            .await
            .unwrap();
        assert_eq!(catalog.entries().await.unwrap().len(), 1);
    }
}
