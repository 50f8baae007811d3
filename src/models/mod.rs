// src/models/mod.rs

//! Domain models for the lending service.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod book;
mod config;
mod isbn;
pub mod loan;
mod notification;

// Re-export all public types
pub use book::{
    BookMetadata, CatalogEntry, NO_THUMBNAIL_URL, UNKNOWN_AUTHOR, UNKNOWN_DATE, UNKNOWN_TITLE,
};
pub use config::{
    Config, LibraryConfig, LoggingConfig, NotifyConfig, ResolverConfig, StorageBackend,
    StorageConfig,
};
pub use isbn::Isbn;
pub use loan::{Borrower, Identity, LoanRecord, LoanStatus, ReturnReceipt, StatusRow};
pub use notification::{Notification, NotificationKind};
