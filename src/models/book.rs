//! Book metadata and catalog entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Isbn;

/// Placeholder used when no provider supplied a title.
pub const UNKNOWN_TITLE: &str = "Unknown title";

/// Placeholder used when no provider supplied any author.
pub const UNKNOWN_AUTHOR: &str = "Unknown author";

/// Placeholder used when no provider supplied a publication date.
pub const UNKNOWN_DATE: &str = "Unknown";

/// Cover image shown when no provider supplied a thumbnail.
pub const NO_THUMBNAIL_URL: &str = "https://books.google.com/googlebooks/images/no_cover_thumb.gif";

/// Separator between author names inside a single store cell.
pub const AUTHOR_SEPARATOR: &str = "; ";

/// Normalized bibliographic metadata. Every field is always populated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookMetadata {
    pub isbn: Isbn,
    pub title: String,
    pub authors: Vec<String>,
    pub published_date: String,
    pub thumbnail_url: String,
}

impl BookMetadata {
    /// Build metadata from partial provider data, filling placeholders
    /// for anything missing or blank.
    pub fn from_partial(
        isbn: Isbn,
        title: Option<String>,
        authors: Vec<String>,
        published_date: Option<String>,
        thumbnail_url: Option<String>,
    ) -> Self {
        let authors: Vec<String> = authors
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        Self {
            isbn,
            title: non_blank(title).unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            authors: if authors.is_empty() {
                vec![UNKNOWN_AUTHOR.to_string()]
            } else {
                authors
            },
            published_date: non_blank(published_date).unwrap_or_else(|| UNKNOWN_DATE.to_string()),
            thumbnail_url: non_blank(thumbnail_url)
                .unwrap_or_else(|| NO_THUMBNAIL_URL.to_string()),
        }
    }

    /// Authors joined for display.
    pub fn authors_display(&self) -> String {
        self.authors.join(", ")
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// One registered title in the organization's catalog.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    pub id: String,
    pub isbn: Isbn,
    pub title: String,
    pub authors: Vec<String>,
    pub published_date: String,
    pub thumbnail_url: String,
    pub registered_at: DateTime<Utc>,
}

impl CatalogEntry {
    /// Create a new entry with a fresh identifier.
    pub fn new(metadata: BookMetadata, registered_at: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            isbn: metadata.isbn,
            title: metadata.title,
            authors: metadata.authors,
            published_date: metadata.published_date,
            thumbnail_url: metadata.thumbnail_url,
            registered_at,
        }
    }

    /// Encode as a store row.
    ///
    /// Column order: id, isbn, title, authors, published_date,
    /// thumbnail_url, registered_at.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.isbn.to_string(),
            self.title.clone(),
            self.authors.join(AUTHOR_SEPARATOR),
            self.published_date.clone(),
            self.thumbnail_url.clone(),
            self.registered_at.to_rfc3339(),
        ]
    }

    /// Decode a store row. Rows without a usable ISBN, or with a
    /// `registered_at` that is not RFC 3339, are rejected. A blank
    /// `registered_at` (hand-entered rows) reads as the Unix epoch.
    pub fn from_row(cells: &[String]) -> std::result::Result<Self, String> {
        let cell = |i: usize| cells.get(i).map(|s| s.trim()).unwrap_or("");

        let isbn = Isbn::parse(cell(1)).map_err(|e| e.to_string())?;
        let registered_at = match cell(6) {
            "" => {
                log::debug!("Catalog row for {} has no registered_at", isbn);
                DateTime::<Utc>::default()
            }
            raw => DateTime::parse_from_rfc3339(raw)
                .map(|d| d.with_timezone(&Utc))
                .map_err(|_| format!("bad registered_at '{raw}'"))?,
        };
        let authors = cell(3)
            .split(AUTHOR_SEPARATOR.trim())
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();

        Ok(Self {
            id: cell(0).to_string(),
            isbn,
            title: cell(2).to_string(),
            authors,
            published_date: cell(4).to_string(),
            thumbnail_url: cell(5).to_string(),
            registered_at,
        })
    }

    pub fn authors_display(&self) -> String {
        self.authors.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn isbn() -> Isbn {
        Isbn::parse("9780000000001").unwrap()
    }

    fn entry() -> CatalogEntry {
        let meta = BookMetadata::from_partial(isbn(), Some("Test Book".into()), vec![], None, None);
        CatalogEntry::new(meta, Utc.with_ymd_and_hms(2024, 2, 20, 3, 0, 0).unwrap())
    }

    #[test]
    fn test_placeholders_fill_missing_fields() {
        let meta = BookMetadata::from_partial(isbn(), None, vec![" ".into()], Some("".into()), None);
        assert_eq!(meta.title, UNKNOWN_TITLE);
        assert_eq!(meta.authors, vec![UNKNOWN_AUTHOR.to_string()]);
        assert_eq!(meta.published_date, UNKNOWN_DATE);
        assert_eq!(meta.thumbnail_url, NO_THUMBNAIL_URL);
    }

    #[test]
    fn test_row_layout_survives_reload() {
        let meta = BookMetadata::from_partial(
            isbn(),
            Some("Test Book".into()),
            vec!["Tolkien, J.R.R.".into(), "Someone Else".into()],
            Some("1954".into()),
            None,
        );
        let registered = Utc.with_ymd_and_hms(2024, 2, 20, 3, 0, 0).unwrap();
        let entry = CatalogEntry::new(meta, registered);

        let row = entry.to_row();
        assert_eq!(row[1], "9780000000001");
        assert_eq!(row[3], "Tolkien, J.R.R.; Someone Else");

        let decoded = CatalogEntry::from_row(&row).unwrap();
        assert_eq!(decoded, entry);
    }

    #[test]
    fn test_row_without_isbn_is_rejected() {
        let row = vec!["id".to_string(), "".to_string(), "Title".to_string()];
        assert!(CatalogEntry::from_row(&row).is_err());
    }

    #[test]
    fn test_garbled_registered_at_is_rejected() {
        let mut row = entry().to_row();
        row[6] = "last tuesday".to_string();
        let err = CatalogEntry::from_row(&row).unwrap_err();
        assert!(err.contains("registered_at"), "{err}");
    }

    #[test]
    fn test_blank_registered_at_reads_as_epoch() {
        let mut row = entry().to_row();
        row[6] = String::new();
        let decoded = CatalogEntry::from_row(&row).unwrap();
        assert_eq!(decoded.registered_at, DateTime::<Utc>::default());
        assert_eq!(decoded.title, entry().title);
    }
}
