// src/services/reminder.rs

//! Daily reminder sweep: email borrowers whose loan falls due in a few days.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::models::{Isbn, LoanRecord, Notification, NotificationKind, UNKNOWN_TITLE};
use crate::services::catalog::Catalog;
use crate::services::ledger::{Ledger, LedgerRow};
use crate::services::notifier::Notifier;
use crate::utils::time::{CivilCalendar, add_days};

/// What one sweep did.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct SweepReport {
    pub target: Option<NaiveDate>,
    /// Every open loan due on the target date
    pub due: Vec<LoanRecord>,
    pub sent: usize,
    pub skipped_no_email: usize,
    pub already_reminded: usize,
    pub failed: usize,
}

/// Open loans due exactly on `target`, in ledger order.
pub fn due_for_reminder(rows: &[LedgerRow], target: NaiveDate) -> Vec<&LedgerRow> {
    rows.iter()
        .filter(|row| row.loan.is_open() && row.loan.due_at == target)
        .collect()
}

pub struct ReminderSweep<'a> {
    pub ledger: &'a Ledger,
    pub catalog: &'a Catalog,
    pub notifier: &'a Notifier,
    pub calendar: CivilCalendar,
    pub days_before: i64,
    pub dedupe: bool,
}

impl ReminderSweep<'_> {
    pub async fn run(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let today = self.calendar.date_of(now);
        let target = add_days(today, self.days_before);

        let rows = self.ledger.rows().await?;
        let due = due_for_reminder(&rows, target);
        log::info!("Reminder sweep for {}: {} loan(s) due", target, due.len());

        let mut report = SweepReport {
            target: Some(target),
            due: due.iter().map(|row| row.loan.clone()).collect(),
            ..SweepReport::default()
        };
        if due.is_empty() {
            return Ok(report);
        }

        let titles: HashMap<Isbn, String> = self
            .catalog
            .entries()
            .await?
            .into_iter()
            .map(|e| (e.isbn, e.title))
            .collect();

        for row in due {
            let loan = &row.loan;
            if !loan.borrower.has_email() {
                log::debug!("No email for loan {} ({}), skipping", loan.id, loan.isbn);
                report.skipped_no_email += 1;
                continue;
            }
            if self.dedupe && loan.reminded_on.is_some() {
                report.already_reminded += 1;
                continue;
            }

            let title = titles
                .get(&loan.isbn)
                .map(String::as_str)
                .unwrap_or(UNKNOWN_TITLE);
            let notification = Notification::for_loan(NotificationKind::Reminder, loan, title);

            if self.notifier.dispatch_email(&notification).await == 0 {
                report.failed += 1;
                continue;
            }
            report.sent += 1;

            if self.dedupe {
                if let Err(e) = self.ledger.mark_reminded(row.reference, today).await {
                    log::warn!("Could not record reminder for loan {}: {}", loan.id, e);
                }
            }
        }

        log::info!(
            "Reminder sweep for {} done: {} sent, {} without email, {} already reminded, {} failed",
            target,
            report.sent,
            report.skipped_no_email,
            report.already_reminded,
            report.failed
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Borrower;
    use crate::storage::RowRef;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn row(i: usize, due: &str, returned: Option<&str>) -> LedgerRow {
        let mut loan = LoanRecord::open(
            Isbn::parse(&format!("978000000000{i}")).unwrap(),
            Borrower {
                name: "Alice".into(),
                email: "alice@example.com".into(),
                group: "Eng".into(),
            },
            date("2024-02-20"),
            date(due),
        );
        loan.returned_at = returned.map(date);
        LedgerRow {
            reference: RowRef(i),
            loan,
        }
    }

    #[test]
    fn test_only_open_loans_due_on_target() {
        let rows = vec![
            row(1, "2024-03-05", None),
            row(2, "2024-03-04", None),
            row(3, "2024-03-06", None),
            row(4, "2024-03-05", Some("2024-03-01")),
        ];
        let due = due_for_reminder(&rows, date("2024-03-05"));
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].reference, RowRef(1));
    }
}
