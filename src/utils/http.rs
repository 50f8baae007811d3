// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use url::Url;

use crate::error::Result;
use crate::models::{NotifyConfig, ResolverConfig};

/// Create a configured asynchronous HTTP client.
pub fn create_async_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Client for bibliographic providers.
///
/// The resolver enforces its own per-attempt timeout; the client timeout
/// is a backstop for connections that never yield a response.
pub fn create_provider_client(config: &ResolverConfig) -> Result<reqwest::Client> {
    create_async_client(&config.user_agent, config.timeout() * 2)
}

/// Client for notification channels.
pub fn create_notify_client(config: &NotifyConfig) -> Result<reqwest::Client> {
    create_async_client(
        concat!("shelf/", env!("CARGO_PKG_VERSION")),
        Duration::from_secs(config.timeout_secs),
    )
}

/// Build a URL with query parameters.
pub fn url_with_query(base: &str, params: &[(&str, &str)]) -> Result<Url> {
    Ok(Url::parse_with_params(base, params)?)
}

/// Strip query strings so tokens never reach the logs.
pub fn redact(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.to_string()
        }
        Err(_) => "<invalid url>".to_string(),
    }
}
