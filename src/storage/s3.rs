//! AWS S3 table store.
//!
//! Each table is one JSON object at `{prefix}/{table}.json`, in the same
//! shape as the local store. Appends and updates rewrite the object.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::StorageConfig;
use crate::storage::local::TableFile;
use crate::storage::{CellUpdate, RowRef, StoredRow, TableStore, number_rows, patch_row, row_mut};

/// S3-based table store.
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: String,
    write_lock: Mutex<()>,
}

impl S3Store {
    /// Create a new S3 store instance.
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create an S3 store from configuration and the ambient AWS environment.
    pub async fn from_config(config: &StorageConfig) -> Result<Self> {
        if config.s3_bucket.trim().is_empty() {
            return Err(AppError::config("storage.s3_bucket is not set"));
        }
        let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Ok(Self::new(
            Client::new(&aws),
            &config.s3_bucket,
            &config.s3_prefix,
        ))
    }

    fn key(&self, table: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("{table}.json")
        } else {
            format!("{prefix}/{table}.json")
        }
    }

    async fn load_rows(&self, table: &str) -> Result<Vec<Vec<String>>> {
        let key = self.key(table);
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::upstream("s3", e))?;
                let file: TableFile = serde_json::from_slice(&bytes.into_bytes())?;
                Ok(file.rows)
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    log::info!("No existing table at s3://{}/{}", self.bucket, key);
                    Ok(Vec::new())
                } else {
                    Err(AppError::upstream("s3", service_err))
                }
            }
        }
    }

    async fn save_rows(&self, table: &str, rows: Vec<Vec<String>>) -> Result<()> {
        let key = self.key(table);
        let file = TableFile::new(rows);
        let json = serde_json::to_vec_pretty(&file)?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(json))
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| AppError::upstream("s3", e))?;

        log::debug!("Wrote {} rows to s3://{}/{}", file.count, self.bucket, key);
        Ok(())
    }
}

#[async_trait]
impl TableStore for S3Store {
    fn name(&self) -> &str {
        "s3"
    }

    async fn read_all(&self, table: &str) -> Result<Vec<StoredRow>> {
        Ok(number_rows(self.load_rows(table).await?))
    }

    async fn append(&self, table: &str, cells: Vec<String>) -> Result<RowRef> {
        let _guard = self.write_lock.lock().await;
        let mut rows = self.load_rows(table).await?;
        rows.push(cells);
        let reference = RowRef(rows.len() - 1);
        self.save_rows(table, rows).await?;
        Ok(reference)
    }

    async fn update(&self, table: &str, row: RowRef, updates: &[CellUpdate]) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut rows = self.load_rows(table).await?;
        patch_row(row_mut(&mut rows, table, row)?, updates);
        self.save_rows(table, rows).await
    }
}
