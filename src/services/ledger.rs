// src/services/ledger.rs

//! Append-only loan ledger.
//!
//! A loan is one row. Opening a loan appends; returning it fills the
//! `returned_at` cell of that same row. Nothing is ever deleted, so the
//! table doubles as the lending history.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use crate::error::Result;
use crate::models::loan::{columns, format_date};
use crate::models::{Isbn, LoanRecord};
use crate::storage::{CellUpdate, RowRef, TableStore};
use crate::utils::with_timeout;

/// A decoded ledger row and where it lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRow {
    pub reference: RowRef,
    pub loan: LoanRecord,
}

/// Loans table accessor.
pub struct Ledger {
    store: Arc<dyn TableStore>,
    table: String,
    timeout: Duration,
}

impl Ledger {
    pub fn new(store: Arc<dyn TableStore>, table: impl Into<String>, timeout: Duration) -> Self {
        Self {
            store,
            table: table.into(),
            timeout,
        }
    }

    /// Every decodable row, oldest first.
    pub async fn rows(&self) -> Result<Vec<LedgerRow>> {
        let rows = with_timeout(self.timeout, self.store.read_all(&self.table)).await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| match LoanRecord::from_row(&row.cells) {
                Ok(loan) => Some(LedgerRow {
                    reference: row.reference,
                    loan,
                }),
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
            .collect())
    }

    pub async fn loans(&self) -> Result<Vec<LoanRecord>> {
        Ok(self.rows().await?.into_iter().map(|r| r.loan).collect())
    }

    pub async fn append(&self, loan: &LoanRecord) -> Result<RowRef> {
        with_timeout(self.timeout, self.store.append(&self.table, loan.to_row())).await
    }

    /// Record the return date. Only the `returned_at` cell is touched.
    pub async fn close(&self, row: RowRef, returned_on: NaiveDate) -> Result<()> {
        let update = [CellUpdate::new(columns::RETURNED_AT, format_date(returned_on))];
        with_timeout(self.timeout, self.store.update(&self.table, row, &update)).await
    }

    /// Record that a reminder went out for this loan.
    pub async fn mark_reminded(&self, row: RowRef, on: NaiveDate) -> Result<()> {
        let update = [CellUpdate::new(columns::REMINDED_ON, format_date(on))];
        with_timeout(self.timeout, self.store.update(&self.table, row, &update)).await
    }
}

/// The most recent open loan for an ISBN.
pub fn newest_open<'a>(rows: &'a [LedgerRow], isbn: &Isbn) -> Option<&'a LedgerRow> {
    rows.iter()
        .rev()
        .find(|row| row.loan.is_open() && &row.loan.isbn == isbn)
}

/// Open loans keyed by ISBN. If the ledger somehow holds two open loans for
/// one ISBN, the newest wins.
pub fn open_index(rows: &[LedgerRow]) -> HashMap<Isbn, LoanRecord> {
    rows.iter()
        .filter(|row| row.loan.is_open())
        .map(|row| (row.loan.isbn.clone(), row.loan.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Borrower;
    use crate::storage::MemoryStore;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn loan(isbn: &str, who: &str) -> LoanRecord {
        LoanRecord::open(
            Isbn::parse(isbn).unwrap(),
            Borrower {
                name: who.into(),
                email: format!("{}@example.com", who.to_lowercase()),
                group: "Eng".into(),
            },
            date("2024-02-20"),
            date("2024-03-05"),
        )
    }

    fn ledger(store: Arc<MemoryStore>) -> Ledger {
        Ledger::new(store, "loans", Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_close_touches_only_return_cell() {
        let store = Arc::new(MemoryStore::new());
        let ledger = ledger(store.clone());
        let original = loan("9780000000001", "Alice");
        let row = ledger.append(&original).await.unwrap();

        ledger.close(row, date("2024-03-01")).await.unwrap();

        let stored = &store.rows("loans").await[0];
        let mut expected = original.to_row();
        expected[columns::RETURNED_AT] = "2024-03-01".into();
        assert_eq!(stored, &expected);
    }

    #[tokio::test]
    async fn test_newest_open_skips_closed_rows() {
        let store = Arc::new(MemoryStore::new());
        let ledger = ledger(store);
        let first = ledger.append(&loan("9780000000001", "Alice")).await.unwrap();
        ledger.close(first, date("2024-02-25")).await.unwrap();
        ledger.append(&loan("9780000000001", "Bob")).await.unwrap();

        let rows = ledger.rows().await.unwrap();
        let isbn = Isbn::parse("9780000000001").unwrap();
        assert_eq!(newest_open(&rows, &isbn).unwrap().loan.borrower.name, "Bob");
        assert_eq!(open_index(&rows).len(), 1);
    }

    #[tokio::test]
    async fn test_mark_reminded() {
        let store = Arc::new(MemoryStore::new());
        let ledger = ledger(store);
        let row = ledger.append(&loan("9780000000001", "Alice")).await.unwrap();
        ledger.mark_reminded(row, date("2024-03-03")).await.unwrap();

        let loans = ledger.loans().await.unwrap();
        assert_eq!(loans[0].reminded_on, Some(date("2024-03-03")));
        assert!(loans[0].is_open());
    }
}
