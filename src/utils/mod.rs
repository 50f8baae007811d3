//! Utility functions and helpers.

pub mod http;
pub mod time;

use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Run a fallible future under a time budget.
pub async fn with_timeout<T, F>(budget: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(budget, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::Timeout(budget)),
    }
}
