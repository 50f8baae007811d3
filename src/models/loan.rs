//! Loan records, borrowers and derived lending status.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{CatalogEntry, Isbn};

/// Date format used for civil dates in the store.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Column positions of the loans table.
pub mod columns {
    pub const RETURNED_AT: usize = 7;
    pub const REMINDED_ON: usize = 8;
}

/// A verified identity supplied by the authentication layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    /// Durable account identifier
    pub email: String,
    pub display_name: String,
}

impl Identity {
    pub fn new(email: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            display_name: display_name.into(),
        }
    }
}

/// Borrower details captured at borrow time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Borrower {
    pub name: String,
    pub email: String,
    /// Free-text group or affiliation tag
    pub group: String,
}

impl Borrower {
    pub fn from_identity(identity: &Identity, group: impl Into<String>) -> Self {
        Self {
            name: identity.display_name.clone(),
            email: identity.email.clone(),
            group: group.into(),
        }
    }

    pub fn has_email(&self) -> bool {
        !self.email.trim().is_empty()
    }
}

/// One borrow/return cycle in the ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoanRecord {
    pub id: String,
    pub isbn: Isbn,
    pub borrower: Borrower,
    pub borrowed_at: NaiveDate,
    pub due_at: NaiveDate,
    pub returned_at: Option<NaiveDate>,
    /// Civil date of the last reminder sent for this loan
    #[serde(default)]
    pub reminded_on: Option<NaiveDate>,
}

impl LoanRecord {
    /// Open a new loan with a fresh identifier.
    pub fn open(isbn: Isbn, borrower: Borrower, borrowed_at: NaiveDate, due_at: NaiveDate) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            isbn,
            borrower,
            borrowed_at,
            due_at,
            returned_at: None,
            reminded_on: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }

    /// Encode as a store row.
    ///
    /// Column order: id, isbn, borrower_name, borrower_email,
    /// borrower_group, borrowed_at, due_at, returned_at, reminded_on.
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.isbn.to_string(),
            self.borrower.name.clone(),
            self.borrower.email.clone(),
            self.borrower.group.clone(),
            format_date(self.borrowed_at),
            format_date(self.due_at),
            self.returned_at.map(format_date).unwrap_or_default(),
            self.reminded_on.map(format_date).unwrap_or_default(),
        ]
    }

    /// Decode a store row.
    pub fn from_row(cells: &[String]) -> std::result::Result<Self, String> {
        let cell = |i: usize| cells.get(i).map(|s| s.trim()).unwrap_or("");

        let isbn = Isbn::parse(cell(1)).map_err(|e| e.to_string())?;
        let borrowed_at = parse_date(cell(5)).ok_or_else(|| format!("bad borrowed_at '{}'", cell(5)))?;
        let due_at = parse_date(cell(6)).ok_or_else(|| format!("bad due_at '{}'", cell(6)))?;
        let returned_at = optional_date(cell(columns::RETURNED_AT))
            .map_err(|raw| format!("bad returned_at '{raw}'"))?;
        let reminded_on = optional_date(cell(columns::REMINDED_ON)).unwrap_or(None);

        Ok(Self {
            id: cell(0).to_string(),
            isbn,
            borrower: Borrower {
                name: cell(2).to_string(),
                email: cell(3).to_string(),
                group: cell(4).to_string(),
            },
            borrowed_at,
            due_at,
            returned_at,
            reminded_on,
        })
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

/// Empty cell means absent; anything else must parse.
fn optional_date(raw: &str) -> std::result::Result<Option<NaiveDate>, String> {
    if raw.is_empty() {
        return Ok(None);
    }
    parse_date(raw).map(Some).ok_or_else(|| raw.to_string())
}

/// Lending status derived from the ledger.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoanStatus {
    Available,
    Lent {
        loan_id: String,
        borrower: Borrower,
        borrowed_at: NaiveDate,
        due_at: NaiveDate,
        overdue: bool,
    },
}

impl LoanStatus {
    pub fn from_open_loan(loan: &LoanRecord, today: NaiveDate) -> Self {
        LoanStatus::Lent {
            loan_id: loan.id.clone(),
            borrower: loan.borrower.clone(),
            borrowed_at: loan.borrowed_at,
            due_at: loan.due_at,
            overdue: today > loan.due_at,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, LoanStatus::Available)
    }

    pub fn label(&self) -> &'static str {
        match self {
            LoanStatus::Available => "available",
            LoanStatus::Lent { overdue: true, .. } => "overdue",
            LoanStatus::Lent { .. } => "lent",
        }
    }
}

/// One line of the status listing.
#[derive(Debug, Clone, Serialize)]
pub struct StatusRow {
    pub entry: CatalogEntry,
    pub status: LoanStatus,
}

/// Outcome of a successful return.
#[derive(Debug, Clone, Serialize)]
pub struct ReturnReceipt {
    pub title: String,
    pub borrower: Borrower,
    pub loan: LoanRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn sample() -> LoanRecord {
        LoanRecord::open(
            Isbn::parse("9780000000001").unwrap(),
            Borrower {
                name: "Alice".into(),
                email: "alice@example.com".into(),
                group: "Eng".into(),
            },
            date("2024-02-20"),
            date("2024-03-05"),
        )
    }

    #[test]
    fn test_open_row_has_empty_return_cell() {
        let row = sample().to_row();
        assert_eq!(row.len(), 9);
        assert_eq!(row[columns::RETURNED_AT], "");
        assert_eq!(row[5], "2024-02-20");
    }

    #[test]
    fn test_decode_returned_row() {
        let mut row = sample().to_row();
        row[columns::RETURNED_AT] = "2024-03-01".into();
        let loan = LoanRecord::from_row(&row).unwrap();
        assert!(!loan.is_open());
        assert_eq!(loan.returned_at, Some(date("2024-03-01")));
    }

    #[test]
    fn test_decode_short_row_treats_missing_cells_as_empty() {
        let row: Vec<String> = sample().to_row().into_iter().take(7).collect();
        let loan = LoanRecord::from_row(&row).unwrap();
        assert!(loan.is_open());
        assert!(loan.reminded_on.is_none());
    }

    #[test]
    fn test_decode_rejects_garbage_return_date() {
        let mut row = sample().to_row();
        row[columns::RETURNED_AT] = "soon".into();
        assert!(LoanRecord::from_row(&row).is_err());
    }

    #[test]
    fn test_status_label() {
        let loan = sample();
        assert_eq!(LoanStatus::from_open_loan(&loan, date("2024-03-05")).label(), "lent");
        assert_eq!(LoanStatus::from_open_loan(&loan, date("2024-03-06")).label(), "overdue");
        assert_eq!(LoanStatus::Available.label(), "available");
    }
}
