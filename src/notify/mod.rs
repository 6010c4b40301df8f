// src/notify/mod.rs
//! Delivery channels. Each channel renders an [`ArticleMessage`] in its own
//! format and posts it with the shared [`retry::RetryPolicy`].

pub mod retry;
pub mod teams;
pub mod telegram;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;
use tracing::{info, warn};

use crate::ingest::types::CandidateArticle;

pub use retry::RetryPolicy;
pub use teams::TeamsNotifier;
pub use telegram::TelegramNotifier;

/// Rendered-agnostic content of one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleMessage {
    pub title: String,
    pub published_date: NaiveDate,
    pub published_time: NaiveTime,
    pub url: String,
    pub summary: String,
}

impl ArticleMessage {
    pub fn new(title: &str, url: &str, candidate: &CandidateArticle, summary: &str) -> Self {
        let title = title.trim();
        Self {
            title: if title.is_empty() {
                "Untitled Article".to_string()
            } else {
                title.to_string()
            },
            published_date: candidate.published_date,
            published_time: candidate.published_time,
            url: url.to_string(),
            summary: summary.trim().to_string(),
        }
    }

    pub fn date_line(&self) -> String {
        format!(
            "{} {}",
            self.published_date.format("%Y-%m-%d"),
            self.published_time.format("%H:%M:%S")
        )
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("message has no visible text")]
    Empty,
    #[error("no delivery channel configured")]
    NoChannels,
    #[error("{channel}: {source}")]
    Channel {
        channel: String,
        #[source]
        source: Box<DeliveryError>,
    },
}

impl DeliveryError {
    pub fn is_server_error(&self) -> bool {
        matches!(self, DeliveryError::Status { status, .. } if *status >= 500)
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        DeliveryError::Transport(e.to_string())
    }
}

/// Map a webhook/API response to a delivery result. 429 carries the
/// `Retry-After` hint (whole seconds) when the server sent one.
pub async fn check_response(resp: reqwest::Response) -> Result<(), DeliveryError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    if status.as_u16() == 429 {
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        return Err(DeliveryError::RateLimited { retry_after });
    }
    let body = resp.text().await.unwrap_or_default();
    Err(DeliveryError::Status {
        status: status.as_u16(),
        body: body.chars().take(200).collect(),
    })
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, msg: &ArticleMessage) -> Result<(), DeliveryError>;

    /// Plain operator text (run start, run errors). Channels that do not
    /// carry notices accept and drop it.
    async fn send_notice(&self, _text: &str) -> Result<(), DeliveryError> {
        Ok(())
    }

    fn name(&self) -> &str;
}

/// Fans one message out to every configured channel.
#[derive(Default)]
pub struct NotifierMux {
    channels: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, channel: Box<dyn Notifier>) -> Self {
        self.channels.push(channel);
        self
    }

    pub fn push(&mut self, channel: Box<dyn Notifier>) {
        self.channels.push(channel);
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }
}

#[async_trait]
impl Notifier for NotifierMux {
    /// Every channel is attempted; the first failure is returned after all
    /// channels ran.
    async fn send(&self, msg: &ArticleMessage) -> Result<(), DeliveryError> {
        if self.channels.is_empty() {
            return Err(DeliveryError::NoChannels);
        }
        let mut first_err = None;
        for ch in &self.channels {
            match ch.send(msg).await {
                Ok(()) => info!(channel = ch.name(), title = %msg.title, "delivered"),
                Err(e) => {
                    warn!(channel = ch.name(), error = %e, "delivery failed");
                    first_err.get_or_insert(DeliveryError::Channel {
                        channel: ch.name().to_string(),
                        source: Box::new(e),
                    });
                }
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    async fn send_notice(&self, text: &str) -> Result<(), DeliveryError> {
        if self.channels.is_empty() {
            return Err(DeliveryError::NoChannels);
        }
        let mut first_err = None;
        for ch in &self.channels {
            if let Err(e) = ch.send_notice(text).await {
                warn!(channel = ch.name(), error = %e, "notice failed");
                first_err.get_or_insert(DeliveryError::Channel {
                    channel: ch.name().to_string(),
                    source: Box::new(e),
                });
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    fn name(&self) -> &str {
        "mux"
    }
}
