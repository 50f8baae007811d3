// src/lambda/mod.rs

//! AWS Lambda handler for the daily reminder sweep.
//!
//! Meant to be triggered once a day by a scheduled rule. The handler:
//! 1. Loads configuration (file named by `SHELF_CONFIG`, then env overrides)
//! 2. Opens the configured store and notification channels
//! 3. Runs the sweep for today, or for the date given in the payload

use chrono::NaiveDate;
use lambda_runtime::{Error as LambdaError, LambdaEvent};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::services::LibraryService;

const DEFAULT_CONFIG_PATH: &str = "shelf.toml";

/// Lambda invocation payload. Scheduled events carry extra fields, which
/// are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct SweepRequest {
    /// Run as if today were this civil date
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

/// Lambda response payload.
#[derive(Debug, Default, Serialize)]
pub struct SweepResponse {
    pub success: bool,

    /// Due date the sweep looked for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<NaiveDate>,

    /// Number of loans due on the target date
    pub due: usize,

    pub sent: usize,
    pub skipped_no_email: usize,
    pub already_reminded: usize,
    pub failed: usize,

    /// Error message if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Error classification (`validation`, `not_found`, `upstream`, ...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,

    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

/// Main Lambda handler function.
#[instrument(skip(event))]
pub async fn handler(
    event: LambdaEvent<SweepRequest>,
) -> std::result::Result<SweepResponse, LambdaError> {
    let start = std::time::Instant::now();
    let (request, _context) = event.into_parts();

    info!("Starting reminder sweep: date={:?}", request.date);

    match run_sweep(&request).await {
        Ok(mut response) => {
            response.execution_time_ms = start.elapsed().as_millis() as u64;
            info!(
                "Sweep completed: {} due, {} sent, {} failed in {}ms",
                response.due, response.sent, response.failed, response.execution_time_ms
            );
            Ok(response)
        }
        Err(e) => {
            error!("Sweep failed ({}): {}", e.kind().as_str(), e);
            let mut response = SweepResponse::failure(&e);
            response.execution_time_ms = start.elapsed().as_millis() as u64;
            Ok(response)
        }
    }
}

impl SweepResponse {
    fn failure(e: &AppError) -> Self {
        SweepResponse {
            success: false,
            error: Some(e.to_string()),
            error_kind: Some(e.kind().as_str()),
            ..Default::default()
        }
    }
}

async fn run_sweep(request: &SweepRequest) -> Result<SweepResponse> {
    let path = std::env::var("SHELF_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load_effective(&path)?;
    let service = LibraryService::from_config(&config).await?;

    let now = match request.date {
        Some(date) => service.calendar().noon_of(date),
        None => chrono::Utc::now(),
    };
    let report = service.run_reminder_sweep(now).await?;

    Ok(SweepResponse {
        success: true,
        target: report.target,
        due: report.due.len(),
        sent: report.sent,
        skipped_no_email: report.skipped_no_email,
        already_reminded: report.already_reminded,
        failed: report.failed,
        error: None,
        error_kind: None,
        execution_time_ms: 0,
    })
}
