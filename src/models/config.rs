//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Lending rules and the civil calendar
    #[serde(default)]
    pub library: LibraryConfig,

    /// Metadata provider chain settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Backing store settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Notification channel settings
    #[serde(default)]
    pub notify: NotifyConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Load the file (or defaults), apply environment overrides, validate.
    pub fn load_effective(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = if path.as_ref().exists() {
            Self::load(&path)?
        } else {
            log::info!("No config at {:?}, using defaults", path.as_ref());
            Self::default()
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Override secrets and deployment-specific values from the environment.
    pub fn apply_env(&mut self) {
        self.apply_vars(|key| std::env::var(key).ok());
    }

    fn apply_vars(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = var("SHELF_STORAGE_DIR") {
            self.storage.local_dir = PathBuf::from(dir);
        }
        if let Some(id) = var("SHELF_SPREADSHEET_ID") {
            self.storage.spreadsheet_id = Some(id);
        }
        if let Some(token) = var("SHELF_SHEETS_TOKEN") {
            self.storage.access_token = Some(token);
        }
        if let Some(url) = var("SHELF_WEBHOOK_URL") {
            self.notify.webhook_url = Some(url);
        }
        if let Some(key) = var("SHELF_MAIL_API_KEY") {
            self.notify.mail_api_key = Some(key);
        }
        if let Some(key) = var("SHELF_GOOGLE_BOOKS_KEY") {
            self.resolver.google_books_api_key = Some(key);
        }
        if let Some(offset) = var("SHELF_UTC_OFFSET_MINUTES").and_then(|v| v.parse().ok()) {
            self.library.utc_offset_minutes = offset;
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.library.loan_period_days <= 0 {
            return Err(AppError::config("library.loan_period_days must be > 0"));
        }
        if self.library.reminder_days_before < 0 {
            return Err(AppError::config(
                "library.reminder_days_before must be >= 0",
            ));
        }
        self.library.offset()?;
        if self.resolver.timeout_ms == 0 {
            return Err(AppError::config("resolver.timeout_ms must be > 0"));
        }
        if self.resolver.max_attempts == 0 {
            return Err(AppError::config("resolver.max_attempts must be > 0"));
        }
        if self.resolver.providers.is_empty() {
            return Err(AppError::config("resolver.providers is empty"));
        }
        if self.resolver.user_agent.trim().is_empty() {
            return Err(AppError::config("resolver.user_agent is empty"));
        }
        if self.storage.timeout_secs == 0 {
            return Err(AppError::config("storage.timeout_secs must be > 0"));
        }
        if self.storage.catalog_table.trim().is_empty() || self.storage.loans_table.trim().is_empty()
        {
            return Err(AppError::config("storage table names must not be empty"));
        }
        if self.storage.catalog_table == self.storage.loans_table {
            return Err(AppError::config(
                "storage.catalog_table and storage.loans_table must differ",
            ));
        }
        Ok(())
    }
}

/// Lending rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Days between borrowing and the due date
    #[serde(default = "defaults::loan_period_days")]
    pub loan_period_days: i64,

    /// How many days before the due date reminders go out
    #[serde(default = "defaults::reminder_days_before")]
    pub reminder_days_before: i64,

    /// Offset of the civil calendar from UTC, in minutes
    #[serde(default = "defaults::utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    /// Skip loans that were already reminded
    #[serde(default = "defaults::dedupe_reminders")]
    pub dedupe_reminders: bool,
}

impl LibraryConfig {
    /// The fixed offset of the civil calendar.
    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            AppError::config(format!(
                "library.utc_offset_minutes {} is out of range",
                self.utc_offset_minutes
            ))
        })
    }
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            loan_period_days: defaults::loan_period_days(),
            reminder_days_before: defaults::reminder_days_before(),
            utc_offset_minutes: defaults::utc_offset_minutes(),
            dedupe_reminders: defaults::dedupe_reminders(),
        }
    }
}

/// Metadata provider chain settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Provider names in query order
    #[serde(default = "defaults::providers")]
    pub providers: Vec<String>,

    /// Per-attempt timeout in milliseconds
    #[serde(default = "defaults::resolver_timeout_ms")]
    pub timeout_ms: u64,

    /// Attempts per provider before moving on
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: usize,

    /// User-Agent header for provider requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Optional Google Books API key
    #[serde(default)]
    pub google_books_api_key: Option<String>,
}

impl ResolverConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            providers: defaults::providers(),
            timeout_ms: defaults::resolver_timeout_ms(),
            max_attempts: defaults::max_attempts(),
            user_agent: defaults::user_agent(),
            google_books_api_key: None,
        }
    }
}

/// Which store implementation backs the catalog and ledger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Local,
    Sheets,
    S3,
    Memory,
}

/// Backing store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory for the local JSON tables
    #[serde(default = "defaults::local_dir")]
    pub local_dir: PathBuf,

    /// Table (sheet) holding the catalog
    #[serde(default = "defaults::catalog_table")]
    pub catalog_table: String,

    /// Table (sheet) holding the loan history
    #[serde(default = "defaults::loans_table")]
    pub loans_table: String,

    /// Google Sheets spreadsheet identifier
    #[serde(default)]
    pub spreadsheet_id: Option<String>,

    /// OAuth bearer token for the Sheets API
    #[serde(default)]
    pub access_token: Option<String>,

    /// Sheets API base URL
    #[serde(default = "defaults::sheets_base_url")]
    pub sheets_base_url: String,

    /// S3 bucket for the `s3` backend
    #[serde(default = "defaults::s3_bucket")]
    pub s3_bucket: String,

    /// S3 key prefix for the `s3` backend
    #[serde(default = "defaults::s3_prefix")]
    pub s3_prefix: String,

    /// Timeout applied to every store call, in seconds
    #[serde(default = "defaults::storage_timeout")]
    pub timeout_secs: u64,
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            local_dir: defaults::local_dir(),
            catalog_table: defaults::catalog_table(),
            loans_table: defaults::loans_table(),
            spreadsheet_id: None,
            access_token: None,
            sheets_base_url: defaults::sheets_base_url(),
            s3_bucket: defaults::s3_bucket(),
            s3_prefix: defaults::s3_prefix(),
            timeout_secs: defaults::storage_timeout(),
        }
    }
}

/// Notification channel settings. A channel without its URL is disabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// Chat webhook URL
    #[serde(default)]
    pub webhook_url: Option<String>,

    /// HTTP mail relay endpoint
    #[serde(default)]
    pub mail_endpoint: Option<String>,

    /// Bearer key for the mail relay
    #[serde(default)]
    pub mail_api_key: Option<String>,

    /// Sender address for outgoing mail
    #[serde(default = "defaults::mail_from")]
    pub mail_from: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::notify_timeout")]
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            mail_endpoint: None,
            mail_api_key: None,
            mail_from: defaults::mail_from(),
            timeout_secs: defaults::notify_timeout(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    pub fn loan_period_days() -> i64 {
        14
    }
    pub fn reminder_days_before() -> i64 {
        2
    }
    pub fn utc_offset_minutes() -> i32 {
        9 * 60
    }
    pub fn dedupe_reminders() -> bool {
        true
    }
    pub fn providers() -> Vec<String> {
        vec![
            "google_books".to_string(),
            "openbd".to_string(),
            "open_library".to_string(),
        ]
    }
    pub fn resolver_timeout_ms() -> u64 {
        3_000
    }
    pub fn max_attempts() -> usize {
        2
    }
    pub fn user_agent() -> String {
        concat!("shelf/", env!("CARGO_PKG_VERSION")).to_string()
    }
    pub fn local_dir() -> PathBuf {
        PathBuf::from("data")
    }
    pub fn catalog_table() -> String {
        "books".to_string()
    }
    pub fn loans_table() -> String {
        "loans".to_string()
    }
    pub fn sheets_base_url() -> String {
        "https://sheets.googleapis.com/v4".to_string()
    }
    pub fn s3_bucket() -> String {
        "shelf-ledger".to_string()
    }
    pub fn s3_prefix() -> String {
        "shelf".to_string()
    }
    pub fn storage_timeout() -> u64 {
        10
    }
    pub fn mail_from() -> String {
        "library@example.org".to_string()
    }
    pub fn notify_timeout() -> u64 {
        5
    }
    pub fn log_level() -> String {
        "info".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn defaults_match_lending_rules() {
        let config = Config::default();
        assert_eq!(config.library.loan_period_days, 14);
        assert_eq!(config.library.reminder_days_before, 2);
        assert_eq!(config.resolver.timeout(), Duration::from_secs(3));
        assert_eq!(config.resolver.max_attempts, 2);
    }

    #[test]
    fn validate_rejects_empty_provider_list() {
        let mut config = Config::default();
        config.resolver.providers.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_settings_are_configuration_errors() {
        use crate::error::ErrorKind;

        let mut config = Config::default();
        config.resolver.providers.clear();
        assert_eq!(config.validate().unwrap_err().kind(), ErrorKind::Configuration);

        let mut config = Config::default();
        config.library.loan_period_days = 0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let mut config = Config::default();
        config.library.utc_offset_minutes = -24 * 60;
        assert_eq!(
            config.library.offset().unwrap_err().kind(),
            ErrorKind::Configuration
        );
    }

    #[test]
    fn validate_rejects_out_of_range_offset() {
        let mut config = Config::default();
        config.library.utc_offset_minutes = 24 * 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [storage]
            backend = "sheets"
            spreadsheet_id = "abc"

            [library]
            utc_offset_minutes = 0
            "#,
        )
        .unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Sheets);
        assert_eq!(config.storage.loans_table, "loans");
        assert_eq!(config.library.loan_period_days, 14);
        assert_eq!(config.library.utc_offset_minutes, 0);
    }

    #[test]
    fn load_effective_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shelf.toml");
        fs::write(&path, "[library]\nloan_period_days = 0\n").unwrap();
        assert!(Config::load_effective(&path).is_err());
    }

    #[test]
    fn env_overrides_secrets() {
        let mut config = Config::default();
        config.apply_vars(|key| match key {
            "SHELF_SHEETS_TOKEN" => Some("token".to_string()),
            "SHELF_WEBHOOK_URL" => Some("https://hooks.example.com/x".to_string()),
            _ => None,
        });
        assert_eq!(config.storage.access_token.as_deref(), Some("token"));
        assert_eq!(
            config.notify.webhook_url.as_deref(),
            Some("https://hooks.example.com/x")
        );
        assert!(config.notify.mail_api_key.is_none());
    }
}
