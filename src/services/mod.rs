//! Service layer for the lending application.
//!
//! This module contains the business logic for:
//! - Metadata resolution (`MetadataResolver` over `sources`)
//! - The catalog and the loan ledger (`Catalog`, `Ledger`)
//! - Notification dispatch (`Notifier`)
//! - The daily reminder sweep (`ReminderSweep`)
//! - The `LibraryService` façade tying them together

pub mod catalog;
pub mod ledger;
pub mod library;
pub mod locks;
pub mod notifier;
pub mod reminder;
pub mod resolver;
pub mod sources;

pub use catalog::Catalog;
pub use ledger::{Ledger, LedgerRow};
pub use library::LibraryService;
pub use locks::KeyedLocks;
pub use notifier::{ChannelKind, EmailChannel, NotificationChannel, Notifier, WebhookChannel};
pub use reminder::{ReminderSweep, SweepReport};
pub use resolver::{MetadataResolver, Resolution};
pub use sources::{MetadataSource, SourceError};
