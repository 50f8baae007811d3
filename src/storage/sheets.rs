//! Google Sheets table store.
//!
//! Each table is a sheet (tab) whose first row holds column headers. Data
//! row `RowRef(i)` lives on sheet row `i + 2`.
//!
//! Uses the v4 values API:
//! - `GET  values/{range}`             read a whole sheet
//! - `POST values/{range}:append`      append one row
//! - `POST values:batchUpdate`         patch cells of one row

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use url::Url;

use crate::error::{AppError, Result};
use crate::models::StorageConfig;
use crate::storage::{CellUpdate, RowRef, StoredRow, TableStore, number_rows};
use crate::utils::http::create_async_client;

/// Rows above the data: the header.
const HEADER_ROWS: usize = 1;

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    updates: AppendUpdates,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    updated_range: String,
}

/// Spreadsheet-backed store.
pub struct SheetsStore {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    access_token: String,
}

impl SheetsStore {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        spreadsheet_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            spreadsheet_id: spreadsheet_id.into(),
            access_token: access_token.into(),
        }
    }

    /// Build from configuration; missing credentials are a configuration
    /// error, never a lookup failure.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let spreadsheet_id = config
            .spreadsheet_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| AppError::config("storage.spreadsheet_id is not set"))?;
        let access_token = config
            .access_token
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                AppError::config("storage.access_token is not set (SHELF_SHEETS_TOKEN)")
            })?;

        let client = create_async_client(
            concat!("shelf/", env!("CARGO_PKG_VERSION")),
            config.timeout() + Duration::from_secs(1),
        )?;
        Ok(Self::new(
            client,
            &config.sheets_base_url,
            spreadsheet_id,
            access_token,
        ))
    }

    /// `{base}/spreadsheets/{id}/values/{tail}`
    fn values_url(&self, tail: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| AppError::config("storage.sheets_base_url cannot be a base"))?
            .pop_if_empty()
            .push("spreadsheets")
            .push(&self.spreadsheet_id)
            .push("values")
            .push(tail);
        Ok(url)
    }

    async fn check(response: reqwest::Response, what: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(AppError::upstream(
            "sheets",
            format!("{what} returned {status}: {}", body.chars().take(200).collect::<String>()),
        ))
    }
}

/// Quote a sheet name for use in A1 notation.
fn quoted(table: &str) -> String {
    format!("'{}'", table.replace('\'', "''"))
}

/// Zero-based column index to A1 column letters.
fn column_letters(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

fn sheet_row(row: RowRef) -> usize {
    row.0 + HEADER_ROWS + 1
}

/// Extract the data row from an `updatedRange` such as `'loans'!A5:I5`.
fn row_from_range(range: &str) -> Option<RowRef> {
    let cells = range.rsplit('!').next()?;
    let first = cells.split(':').next()?;
    let digits: String = first.chars().filter(|c| c.is_ascii_digit()).collect();
    let number: usize = digits.parse().ok()?;
    number.checked_sub(HEADER_ROWS + 1).map(RowRef)
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[async_trait]
impl TableStore for SheetsStore {
    fn name(&self) -> &str {
        "sheets"
    }

    async fn read_all(&self, table: &str) -> Result<Vec<StoredRow>> {
        let url = self.values_url(&quoted(table))?;
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .query(&[("majorDimension", "ROWS")])
            .send()
            .await?;
        let range: ValueRange = Self::check(response, "read").await?.json().await?;

        let rows = range
            .values
            .into_iter()
            .skip(HEADER_ROWS)
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();
        Ok(number_rows(rows))
    }

    async fn append(&self, table: &str, cells: Vec<String>) -> Result<RowRef> {
        let url = self.values_url(&format!("{}!A1:append", quoted(table)))?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .query(&[
                ("valueInputOption", "RAW"),
                ("insertDataOption", "INSERT_ROWS"),
            ])
            .json(&json!({ "values": [cells] }))
            .send()
            .await?;
        let appended: AppendResponse = Self::check(response, "append").await?.json().await?;

        row_from_range(&appended.updates.updated_range).ok_or_else(|| {
            AppError::upstream(
                "sheets",
                format!(
                    "unexpected updatedRange '{}'",
                    appended.updates.updated_range
                ),
            )
        })
    }

    async fn update(&self, table: &str, row: RowRef, updates: &[CellUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let data: Vec<_> = updates
            .iter()
            .map(|u| {
                json!({
                    "range": format!("{}!{}{}", quoted(table), column_letters(u.column), sheet_row(row)),
                    "values": [[u.value]],
                })
            })
            .collect();

        let mut url = Url::parse(&self.base_url)?;
        url.path_segments_mut()
            .map_err(|_| AppError::config("storage.sheets_base_url cannot be a base"))?
            .pop_if_empty()
            .push("spreadsheets")
            .push(&self.spreadsheet_id)
            .push("values:batchUpdate");

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "valueInputOption": "RAW", "data": data }))
            .send()
            .await?;
        Self::check(response, "update").await?;
        Ok(())
    }
}
