//! Local filesystem table store.
//!
//! Each table is one JSON document. Writes go to a temp file and are
//! renamed into place, so a failed write leaves the previous table intact.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── books.json            # Catalog
//! └── loans.json            # Loan ledger
//! ```

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::storage::{CellUpdate, RowRef, StoredRow, TableStore, number_rows, patch_row, row_mut};

/// On-disk shape of a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableFile {
    /// Timestamp of the last write
    pub updated_at: DateTime<Utc>,
    /// Row count, for humans reading the file
    pub count: usize,
    /// The rows, in append order
    pub rows: Vec<Vec<String>>,
}

impl TableFile {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self {
            updated_at: Utc::now(),
            count: rows.len(),
            rows,
        }
    }
}

/// Local filesystem storage backend.
#[derive(Debug)]
pub struct LocalStore {
    root_dir: PathBuf,
    // Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl LocalStore {
    /// Create a new LocalStore rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Get the full path for a table.
    fn path(&self, table: &str) -> PathBuf {
        self.root_dir.join(format!("{table}.json"))
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &PathBuf, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Read a table's rows, returning empty if the file doesn't exist.
    async fn load_rows(&self, table: &str) -> Result<Vec<Vec<String>>> {
        let path = self.path(table);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let file: TableFile = serde_json::from_slice(&bytes)?;
                Ok(file.rows)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No table file at {}", path.display());
                Ok(Vec::new())
            }
            Err(e) => Err(AppError::Io(e)),
        }
    }

    async fn save_rows(&self, table: &str, rows: Vec<Vec<String>>) -> Result<()> {
        let file = TableFile::new(rows);
        let bytes = serde_json::to_vec_pretty(&file)?;
        self.write_bytes(&self.path(table), &bytes).await
    }
}

#[async_trait]
impl TableStore for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn read_all(&self, table: &str) -> Result<Vec<StoredRow>> {
        Ok(number_rows(self.load_rows(table).await?))
    }

    async fn append(&self, table: &str, cells: Vec<String>) -> Result<RowRef> {
        let _guard = self.write_lock.lock().await;
        let mut rows = self.load_rows(table).await?;
        rows.push(cells);
        let reference = RowRef(rows.len() - 1);
        self.save_rows(table, rows).await?;
        Ok(reference)
    }

    async fn update(&self, table: &str, row: RowRef, updates: &[CellUpdate]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut rows = self.load_rows(table).await?;
        patch_row(row_mut(&mut rows, table, row)?, updates);
        self.save_rows(table, rows).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_read_missing_table_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        assert!(store.read_all("books").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rows_survive_a_new_store_instance() {
        let tmp = TempDir::new().unwrap();
        {
            let store = LocalStore::new(tmp.path());
            store.append("loans", vec!["1".into(), "".into()]).await.unwrap();
            store.append("loans", vec!["2".into(), "".into()]).await.unwrap();
            store
                .update("loans", RowRef(0), &[CellUpdate::new(1, "2024-03-01")])
                .await
                .unwrap();
        }

        let reopened = LocalStore::new(tmp.path());
        let rows = reopened.read_all("loans").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].cells[1], "2024-03-01");
        assert_eq!(rows[1].reference, RowRef(1));
        assert!(tmp.path().join("loans.json").exists());
        assert!(!tmp.path().join("loans.tmp").exists());
    }

    #[tokio::test]
    async fn test_update_stale_row_leaves_file_unchanged() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());
        store.append("loans", vec!["1".into()]).await.unwrap();

        let result = store
            .update("loans", RowRef(5), &[CellUpdate::new(0, "x")])
            .await;
        assert!(result.is_err());
        assert_eq!(store.read_all("loans").await.unwrap()[0].cells, vec!["1"]);
    }

    #[tokio::test]
    async fn test_corrupt_table_is_an_error() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("books.json"), b"{not json")
            .await
            .unwrap();
        let store = LocalStore::new(tmp.path());
        assert!(matches!(
            store.read_all("books").await,
            Err(AppError::Json(_))
        ));
    }
}
