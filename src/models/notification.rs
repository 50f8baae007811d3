//! Structured notification messages.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{Borrower, Isbn, LoanRecord};
use crate::models::loan::format_date;

/// What happened to trigger a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Borrowed,
    Returned,
    Reminder,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Borrowed => "borrowed",
            NotificationKind::Returned => "returned",
            NotificationKind::Reminder => "reminder",
        }
    }
}

/// A fully-formed message handed to the notification channels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub isbn: Isbn,
    pub title: String,
    pub borrower: Borrower,
    pub borrowed_at: NaiveDate,
    pub due_at: NaiveDate,
    pub returned_at: Option<NaiveDate>,
}

impl Notification {
    pub fn for_loan(kind: NotificationKind, loan: &LoanRecord, title: impl Into<String>) -> Self {
        Self {
            kind,
            isbn: loan.isbn.clone(),
            title: title.into(),
            borrower: loan.borrower.clone(),
            borrowed_at: loan.borrowed_at,
            due_at: loan.due_at,
            returned_at: loan.returned_at,
        }
    }

    /// Short subject line, used for email subjects.
    pub fn subject(&self) -> String {
        match self.kind {
            NotificationKind::Borrowed => format!("Borrowed: {}", self.title),
            NotificationKind::Returned => format!("Returned: {}", self.title),
            NotificationKind::Reminder => format!("Due soon: {}", self.title),
        }
    }

    /// Plain-text body shared by every channel.
    pub fn body(&self) -> String {
        let who = if self.borrower.group.is_empty() {
            self.borrower.name.clone()
        } else {
            format!("{} ({})", self.borrower.name, self.borrower.group)
        };

        match self.kind {
            NotificationKind::Borrowed => format!(
                "{} borrowed \"{}\" (ISBN {}) on {}. Please return it by {}.",
                who,
                self.title,
                self.isbn,
                format_date(self.borrowed_at),
                format_date(self.due_at)
            ),
            NotificationKind::Returned => format!(
                "{} returned \"{}\" (ISBN {}) on {}.",
                who,
                self.title,
                self.isbn,
                self.returned_at
                    .map(format_date)
                    .unwrap_or_else(|| "an unknown date".to_string())
            ),
            NotificationKind::Reminder => format!(
                "Hello {}, \"{}\" (ISBN {}) borrowed on {} is due on {}. Please return it on time.",
                self.borrower.name,
                self.title,
                self.isbn,
                format_date(self.borrowed_at),
                format_date(self.due_at)
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_borrowed_body_mentions_due_date() {
        let loan = LoanRecord::open(
            Isbn::parse("9780000000001").unwrap(),
            Borrower {
                name: "Alice".into(),
                email: "alice@example.com".into(),
                group: "Eng".into(),
            },
            NaiveDate::from_ymd_opt(2024, 12, 25).unwrap(),
            NaiveDate::from_ymd_opt(2025, 1, 8).unwrap(),
        );
        let n = Notification::for_loan(NotificationKind::Borrowed, &loan, "Test Book");
        assert_eq!(n.subject(), "Borrowed: Test Book");
        assert!(n.body().contains("Alice (Eng)"));
        assert!(n.body().contains("2025-01-08"));
    }
}
