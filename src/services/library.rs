// src/services/library.rs

//! The lending service: catalog, ledger, resolver and notifications behind
//! one façade.
//!
//! Every public operation normalizes its ISBN first and reports
//! transport-level failures as opaque [`AppError::Upstream`] errors after
//! logging the detail.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};

use crate::error::{AppError, Result};
use crate::models::{
    BookMetadata, Borrower, CatalogEntry, Config, Identity, Isbn, LibraryConfig, LoanRecord,
    LoanStatus, Notification, NotificationKind, ReturnReceipt, StatusRow, UNKNOWN_TITLE,
};
use crate::services::catalog::Catalog;
use crate::services::ledger::{Ledger, newest_open, open_index};
use crate::services::locks::KeyedLocks;
use crate::services::notifier::Notifier;
use crate::services::reminder::{ReminderSweep, SweepReport};
use crate::services::resolver::{MetadataResolver, Resolution};
use crate::storage::{TableStore, open_store};
use crate::utils::time::{CivilCalendar, Clock, SystemClock, add_days};

pub struct LibraryService {
    rules: LibraryConfig,
    calendar: CivilCalendar,
    clock: Arc<dyn Clock>,
    catalog: Catalog,
    ledger: Ledger,
    resolver: MetadataResolver,
    notifier: Notifier,
    locks: KeyedLocks,
}

impl LibraryService {
    pub fn new(
        config: &Config,
        store: Arc<dyn TableStore>,
        resolver: MetadataResolver,
        notifier: Notifier,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let timeout = config.storage.timeout();
        Ok(Self {
            rules: config.library.clone(),
            calendar: CivilCalendar::from_config(&config.library)?,
            clock,
            catalog: Catalog::new(Arc::clone(&store), &config.storage.catalog_table, timeout),
            ledger: Ledger::new(store, &config.storage.loans_table, timeout),
            resolver,
            notifier,
            locks: KeyedLocks::new(),
        })
    }

    /// Wire up the store, providers and channels named in configuration.
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let store = open_store(&config.storage).await?;
        log::info!("Using {} store", store.name());
        let resolver = MetadataResolver::from_config(&config.resolver)?;
        log::info!("Metadata providers: {}", resolver.source_names().join(", "));
        let notifier = Notifier::from_config(&config.notify)?;
        Self::new(config, store, resolver, notifier, Arc::new(SystemClock))
    }

    pub fn calendar(&self) -> CivilCalendar {
        self.calendar
    }

    /// Today in the organization's calendar.
    pub fn today(&self) -> NaiveDate {
        self.calendar.date_of(self.clock.now())
    }

    /// Look an ISBN up in the catalog only. Absent means not ours.
    pub async fn resolve_catalog(&self, raw: &str) -> Result<BookMetadata> {
        let isbn = Isbn::parse(raw)?;
        let resolution = self
            .catalog
            .confirm(&isbn)
            .await
            .map_err(|e| e.surface("resolve_catalog", isbn.as_str()))?;
        resolution
            .into_metadata()
            .ok_or_else(|| AppError::NotInInventory(isbn.to_string()))
    }

    /// Look an ISBN up with the external providers.
    pub async fn resolve_discovery(&self, raw: &str) -> Result<Resolution> {
        let isbn = Isbn::parse(raw)?;
        Ok(self.resolver.discover(&isbn).await)
    }

    /// Add a title to the catalog.
    pub async fn register(&self, raw: &str, metadata: BookMetadata) -> Result<CatalogEntry> {
        let isbn = Isbn::parse(raw)?;
        if metadata.title.trim().is_empty() {
            return Err(AppError::validation("title must not be blank"));
        }
        let metadata = BookMetadata { isbn, ..metadata };

        let _guard = self.locks.lock(metadata.isbn.as_str()).await;
        let now = self.clock.now();
        let id = metadata.isbn.to_string();
        self.catalog
            .register(metadata, now)
            .await
            .map_err(|e| e.surface("register", &id))
    }

    /// Discover metadata and register it in one step.
    pub async fn register_isbn(&self, raw: &str) -> Result<CatalogEntry> {
        let isbn = Isbn::parse(raw)?;
        match self.resolver.discover(&isbn).await {
            Resolution::Found { metadata, .. } => self.register(isbn.as_str(), metadata).await,
            Resolution::NotFound => Err(AppError::not_found(format!(
                "no provider has metadata for ISBN {isbn}"
            ))),
        }
    }

    /// Lend an item to the identified person.
    pub async fn borrow(
        &self,
        raw: &str,
        identity: Option<&Identity>,
        group: &str,
    ) -> Result<LoanRecord> {
        let identity = identity.ok_or(AppError::Unauthorized)?;
        let isbn = Isbn::parse(raw)?;
        if group.trim().is_empty() {
            return Err(AppError::validation("group must not be blank"));
        }

        let guard = self.locks.lock(isbn.as_str()).await;
        let (loan, title) = self
            .open_loan(&isbn, identity, group.trim())
            .await
            .map_err(|e| e.surface("borrow", isbn.as_str()))?;
        drop(guard);

        log::info!(
            "{} borrowed {} until {}",
            loan.borrower.name,
            isbn,
            loan.due_at
        );
        let notification = Notification::for_loan(NotificationKind::Borrowed, &loan, title);
        self.notifier.dispatch(&notification).await;
        Ok(loan)
    }

    async fn open_loan(
        &self,
        isbn: &Isbn,
        identity: &Identity,
        group: &str,
    ) -> Result<(LoanRecord, String)> {
        let entry = self
            .catalog
            .find(isbn)
            .await?
            .ok_or_else(|| AppError::NotInInventory(isbn.to_string()))?;

        let rows = self.ledger.rows().await?;
        if let Some(open) = newest_open(&rows, isbn) {
            return Err(AppError::conflict(format!(
                "ISBN {} is already lent to {} until {}",
                isbn, open.loan.borrower.name, open.loan.due_at
            )));
        }

        let borrowed_at = self.today();
        let due_at = add_days(borrowed_at, self.rules.loan_period_days);
        let loan = LoanRecord::open(
            isbn.clone(),
            Borrower::from_identity(identity, group),
            borrowed_at,
            due_at,
        );
        self.ledger.append(&loan).await?;
        Ok((loan, entry.title))
    }

    /// Close the newest open loan for an ISBN.
    pub async fn return_item(&self, raw: &str) -> Result<ReturnReceipt> {
        let isbn = Isbn::parse(raw)?;

        let guard = self.locks.lock(isbn.as_str()).await;
        let receipt = self
            .close_loan(&isbn)
            .await
            .map_err(|e| e.surface("return", isbn.as_str()))?;
        drop(guard);

        log::info!("{} returned {}", receipt.borrower.name, isbn);
        let notification =
            Notification::for_loan(NotificationKind::Returned, &receipt.loan, &receipt.title);
        self.notifier.dispatch(&notification).await;
        Ok(receipt)
    }

    async fn close_loan(&self, isbn: &Isbn) -> Result<ReturnReceipt> {
        let rows = self.ledger.rows().await?;
        let open = newest_open(&rows, isbn)
            .ok_or_else(|| AppError::not_found(format!("ISBN {isbn} is not currently lent")))?;

        let today = self.today();
        self.ledger.close(open.reference, today).await?;

        let title = match self.catalog.find(isbn).await {
            Ok(Some(entry)) => entry.title,
            Ok(None) => UNKNOWN_TITLE.to_string(),
            Err(e) => {
                log::warn!("Catalog lookup for {} after return failed: {}", isbn, e);
                UNKNOWN_TITLE.to_string()
            }
        };
        let mut loan = open.loan.clone();
        loan.returned_at = Some(today);

        Ok(ReturnReceipt {
            title,
            borrower: loan.borrower.clone(),
            loan,
        })
    }

    /// Every catalog entry with its lending status, newest registration first.
    pub async fn list_status(&self) -> Result<Vec<StatusRow>> {
        let rows = self
            .ledger
            .rows()
            .await
            .map_err(|e| e.surface("list_status", "ledger"))?;
        let entries = self
            .catalog
            .entries()
            .await
            .map_err(|e| e.surface("list_status", "catalog"))?;

        let open = open_index(&rows);
        let today = self.today();
        Ok(entries
            .into_iter()
            .rev()
            .map(|entry| {
                let status = match open.get(&entry.isbn) {
                    Some(loan) => LoanStatus::from_open_loan(loan, today),
                    None => LoanStatus::Available,
                };
                StatusRow { entry, status }
            })
            .collect())
    }

    /// Open loans held by one borrower, oldest first.
    pub async fn loans_for(&self, email: &str) -> Result<Vec<LoanRecord>> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AppError::validation("email must not be blank"));
        }
        let loans = self
            .ledger
            .loans()
            .await
            .map_err(|e| e.surface("loans_for", email))?;
        Ok(loans
            .into_iter()
            .filter(|l| l.is_open() && l.borrower.email.eq_ignore_ascii_case(email))
            .collect())
    }

    /// Every loan ever recorded for an ISBN, in ledger order.
    pub async fn history(&self, raw: &str) -> Result<Vec<LoanRecord>> {
        let isbn = Isbn::parse(raw)?;
        let loans = self
            .ledger
            .loans()
            .await
            .map_err(|e| e.surface("history", isbn.as_str()))?;
        Ok(loans.into_iter().filter(|l| l.isbn == isbn).collect())
    }

    /// Open loans past their due date.
    pub async fn overdue(&self) -> Result<Vec<LoanRecord>> {
        let today = self.today();
        let loans = self
            .ledger
            .loans()
            .await
            .map_err(|e| e.surface("overdue", "ledger"))?;
        Ok(loans
            .into_iter()
            .filter(|l| l.is_open() && l.due_at < today)
            .collect())
    }

    /// Remind borrowers whose loans fall due `reminder_days_before` days
    /// after the civil date of `now`.
    pub async fn run_reminder_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let sweep = ReminderSweep {
            ledger: &self.ledger,
            catalog: &self.catalog,
            notifier: &self.notifier,
            calendar: self.calendar,
            days_before: self.rules.reminder_days_before,
            dedupe: self.rules.dedupe_reminders,
        };
        sweep
            .run(now)
            .await
            .map_err(|e| e.surface("reminder_sweep", "ledger"))
    }
}
