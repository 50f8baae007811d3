//! Tabular store abstractions for the catalog and the loan ledger.
//!
//! The store is spreadsheet-shaped: named tables of string cells, read in
//! full, appended to one row at a time, and patched cell by cell. There is
//! no cross-row transaction and no concurrency token.
//!
//! ## Backends
//!
//! ```text
//! memory   in-process, for tests and dry runs
//! local    {dir}/{table}.json, atomic temp-file + rename writes
//! sheets   Google Sheets values API, first row is the header
//! s3       s3://{bucket}/{prefix}/{table}.json (feature `s3`)
//! ```

pub mod local;
pub mod memory;
#[cfg(feature = "s3")]
pub mod s3;
pub mod sheets;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{StorageBackend, StorageConfig};

// Re-export for convenience
pub use local::LocalStore;
pub use memory::MemoryStore;
#[cfg(feature = "s3")]
pub use s3::S3Store;
pub use sheets::SheetsStore;

/// Reference to a data row: its zero-based position in append order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowRef(pub usize);

/// A row as read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    pub reference: RowRef,
    pub cells: Vec<String>,
}

/// A single-cell patch: column index and new value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellUpdate {
    pub column: usize,
    pub value: String,
}

impl CellUpdate {
    pub fn new(column: usize, value: impl Into<String>) -> Self {
        Self {
            column,
            value: value.into(),
        }
    }
}

/// Trait for tabular storage backends.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Read every data row of a table, in append order. A table that does
    /// not exist yet reads as empty.
    async fn read_all(&self, table: &str) -> Result<Vec<StoredRow>>;

    /// Append one row and return its reference.
    async fn append(&self, table: &str, cells: Vec<String>) -> Result<RowRef>;

    /// Overwrite some cells of an existing row.
    async fn update(&self, table: &str, row: RowRef, updates: &[CellUpdate]) -> Result<()>;
}

/// Number the rows of a table body.
pub(crate) fn number_rows(rows: Vec<Vec<String>>) -> Vec<StoredRow> {
    rows.into_iter()
        .enumerate()
        .map(|(i, cells)| StoredRow {
            reference: RowRef(i),
            cells,
        })
        .collect()
}

/// Apply cell updates to an in-memory row, padding short rows.
pub(crate) fn patch_row(cells: &mut Vec<String>, updates: &[CellUpdate]) {
    for update in updates {
        if cells.len() <= update.column {
            cells.resize(update.column + 1, String::new());
        }
        cells[update.column] = update.value.clone();
    }
}

/// Look up a row for patching, failing when the reference is stale.
pub(crate) fn row_mut<'a>(
    rows: &'a mut [Vec<String>],
    table: &str,
    row: RowRef,
) -> Result<&'a mut Vec<String>> {
    rows.get_mut(row.0)
        .ok_or_else(|| AppError::not_found(format!("row {} of table '{}'", row.0, table)))
}

/// Open the store selected by configuration.
pub async fn open_store(config: &StorageConfig) -> Result<Arc<dyn TableStore>> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::Local => Ok(Arc::new(LocalStore::new(&config.local_dir))),
        StorageBackend::Sheets => Ok(Arc::new(SheetsStore::from_config(config)?)),
        #[cfg(feature = "s3")]
        StorageBackend::S3 => Ok(Arc::new(S3Store::from_config(config).await?)),
        #[cfg(not(feature = "s3"))]
        StorageBackend::S3 => Err(AppError::config(
            "storage.backend = \"s3\" requires the 's3' feature",
        )),
    }
}
