//! In-process table store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{AppError, Result};
use crate::storage::{CellUpdate, RowRef, StoredRow, TableStore, number_rows, patch_row, row_mut};

/// Table store held in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Vec<String>>>>,
    fail_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent append/update fail, leaving data untouched.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Raw rows of a table, for assertions.
    pub async fn rows(&self, table: &str) -> Vec<Vec<String>> {
        self.tables
            .read()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Io(std::io::Error::other(
                "memory store is read-only",
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn read_all(&self, table: &str) -> Result<Vec<StoredRow>> {
        Ok(number_rows(self.rows(table).await))
    }

    async fn append(&self, table: &str, cells: Vec<String>) -> Result<RowRef> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        rows.push(cells);
        Ok(RowRef(rows.len() - 1))
    }

    async fn update(&self, table: &str, row: RowRef, updates: &[CellUpdate]) -> Result<()> {
        self.check_writable()?;
        let mut tables = self.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        patch_row(row_mut(rows, table, row)?, updates);
        Ok(())
    }
}
