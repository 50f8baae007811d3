// src/services/notifier.rs

//! Best-effort notification dispatch.
//!
//! Channels are fire-and-forget: a failure is logged with the channel name
//! and dropped. Nothing here can fail the ledger operation that triggered
//! the message.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde_json::json;

use crate::error::{AppError, Result};
use crate::models::{Notification, NotifyConfig};
use crate::utils::http::{create_notify_client, redact};

/// Kind of delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Chat,
    Email,
}

/// A delivery channel.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> ChannelKind;
    async fn send(&self, notification: &Notification) -> Result<()>;
}

async fn expect_success(response: reqwest::Response, channel: &str) -> Result<()> {
    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(AppError::upstream(channel, format!("status {status}")))
    }
}

/// Chat webhook (Slack- and Discord-compatible payload).
pub struct WebhookChannel {
    client: Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Chat
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        let text = notification.body();
        let response = self
            .client
            .post(&self.url)
            .json(&json!({ "content": text, "text": text }))
            .send()
            .await?;
        expect_success(response, self.name()).await
    }
}

/// Email through an HTTP mail relay.
pub struct EmailChannel {
    client: Client,
    endpoint: String,
    api_key: String,
    from: String,
}

impl EmailChannel {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        let to = notification.borrower.email.trim();
        if to.is_empty() || !to.contains('@') {
            return Err(AppError::validation(format!(
                "no usable email address for {}",
                notification.borrower.name
            )));
        }
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": notification.subject(),
                "text": notification.body(),
            }))
            .send()
            .await?;
        expect_success(response, self.name()).await
    }
}

/// Fans a notification out to the configured channels.
pub struct Notifier {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl Notifier {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    /// Build the channels enabled in configuration.
    pub fn from_config(config: &NotifyConfig) -> Result<Self> {
        let client = create_notify_client(config)?;
        let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();

        if let Some(url) = config.webhook_url.as_deref().filter(|u| !u.trim().is_empty()) {
            log::debug!("Webhook channel enabled: {}", redact(url));
            channels.push(Arc::new(WebhookChannel::new(client.clone(), url)));
        }

        if let Some(endpoint) = config.mail_endpoint.as_deref().filter(|u| !u.trim().is_empty()) {
            let api_key = config
                .mail_api_key
                .as_deref()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| {
                    AppError::config("notify.mail_endpoint is set but notify.mail_api_key is not")
                })?;
            log::debug!("Email channel enabled: {}", redact(endpoint));
            channels.push(Arc::new(EmailChannel::new(
                client,
                endpoint,
                api_key,
                &config.mail_from,
            )));
        }

        if channels.is_empty() {
            log::info!("No notification channels configured");
        }
        Ok(Self::new(channels))
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Send through every channel. Returns the number of deliveries.
    pub async fn dispatch(&self, notification: &Notification) -> usize {
        self.deliver(notification, |_| true).await
    }

    /// Send through email channels only. Returns the number of deliveries.
    pub async fn dispatch_email(&self, notification: &Notification) -> usize {
        self.deliver(notification, |kind| kind == ChannelKind::Email)
            .await
    }

    async fn deliver(
        &self,
        notification: &Notification,
        wanted: impl Fn(ChannelKind) -> bool,
    ) -> usize {
        let targets: Vec<_> = self
            .channels
            .iter()
            .filter(|c| wanted(c.kind()))
            .collect();
        let outcomes = join_all(targets.iter().map(|c| c.send(notification))).await;

        let mut delivered = 0;
        for (channel, outcome) in targets.iter().zip(outcomes) {
            match outcome {
                Ok(()) => {
                    delivered += 1;
                    log::debug!(
                        "{} notification for {} sent via {}",
                        notification.kind.as_str(),
                        notification.isbn,
                        channel.name()
                    );
                }
                Err(e) => log::warn!(
                    "{} notification for {} via {} failed: {}",
                    notification.kind.as_str(),
                    notification.isbn,
                    channel.name(),
                    e
                ),
            }
        }
        delivered
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::NaiveDate;

    use crate::models::{Borrower, Isbn, NotificationKind};

    /// Channel that records what it was asked to send.
    pub(crate) struct RecordingChannel {
        kind: ChannelKind,
        fail: bool,
        delay: Duration,
        sent: Mutex<Vec<Notification>>,
    }

    impl RecordingChannel {
        pub(crate) fn new(kind: ChannelKind, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                kind,
                fail,
                delay: Duration::ZERO,
                sent: Mutex::new(Vec::new()),
            })
        }

        /// A channel that takes `delay` to deliver each message.
        pub(crate) fn slow(kind: ChannelKind, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                kind,
                fail: false,
                delay,
                sent: Mutex::new(Vec::new()),
            })
        }

        pub(crate) fn sent(&self) -> Vec<Notification> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationChannel for RecordingChannel {
        fn name(&self) -> &str {
            "recording"
        }

        fn kind(&self) -> ChannelKind {
            self.kind
        }

        async fn send(&self, notification: &Notification) -> Result<()> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(AppError::upstream("recording", "channel down"));
            }
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    pub(crate) fn notifier(channels: &[&Arc<RecordingChannel>]) -> Notifier {
        Notifier::new(
            channels
                .iter()
                .map(|c| Arc::clone(c) as Arc<dyn NotificationChannel>)
                .collect(),
        )
    }

    fn notification() -> Notification {
        Notification {
            kind: NotificationKind::Reminder,
            isbn: Isbn::parse("9780000000001").unwrap(),
            title: "Test Book".into(),
            borrower: Borrower {
                name: "Alice".into(),
                email: "alice@example.com".into(),
                group: "Eng".into(),
            },
            borrowed_at: NaiveDate::from_ymd_opt(2024, 2, 20).unwrap(),
            due_at: NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            returned_at: None,
        }
    }

    #[tokio::test]
    async fn test_failure_is_swallowed_and_others_still_sent() {
        let broken = RecordingChannel::new(ChannelKind::Chat, true);
        let email = RecordingChannel::new(ChannelKind::Email, false);
        let notifier = notifier(&[&broken, &email]);

        assert_eq!(notifier.dispatch(&notification()).await, 1);
        assert_eq!(email.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_dispatch_email_skips_chat() {
        let chat = RecordingChannel::new(ChannelKind::Chat, false);
        let email = RecordingChannel::new(ChannelKind::Email, false);
        let notifier = notifier(&[&chat, &email]);

        assert_eq!(notifier.dispatch_email(&notification()).await, 1);
        assert!(chat.sent().is_empty());
    }

    #[tokio::test]
    async fn test_email_without_address_fails_before_network() {
        let channel = EmailChannel::new(
            Client::new(),
            "http://127.0.0.1:9/send",
            "key",
            "library@example.org",
        );
        let mut n = notification();
        n.borrower.email = String::new();
        assert!(matches!(
            channel.send(&n).await,
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_from_config_requires_mail_key() {
        let config = NotifyConfig {
            mail_endpoint: Some("https://mail.example.com/send".into()),
            ..NotifyConfig::default()
        };
        assert!(matches!(
            Notifier::from_config(&config),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn test_from_config_without_channels() {
        let notifier = Notifier::from_config(&NotifyConfig::default()).unwrap();
        assert_eq!(notifier.channel_count(), 0);
    }
}
