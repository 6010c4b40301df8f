// src/notify/telegram.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::retry::{send_with_retry, RetryPolicy};
use super::{check_response, ArticleMessage, DeliveryError, Notifier};
use crate::fingerprint::clean_text;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct TelegramNotifier {
    token: String,
    chat_id: String,
    api_base: String,
    client: Client,
    timeout: Duration,
    policy: RetryPolicy,
}

impl TelegramNotifier {
    pub fn new(token: String, chat_id: String) -> Self {
        Self {
            token,
            chat_id,
            api_base: DEFAULT_API_BASE.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(10),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }

    async fn post_html(&self, html: &str) -> Result<(), DeliveryError> {
        if clean_text(html).is_empty() {
            return Err(DeliveryError::Empty);
        }
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text: html.trim(),
            parse_mode: "HTML",
            disable_web_page_preview: false,
        };
        let url = self.endpoint();
        let (client, timeout, url, payload) = (&self.client, self.timeout, &url, &payload);
        send_with_retry(&self.policy, "telegram", move || async move {
            let rsp = client
                .post(url)
                .timeout(timeout)
                .json(payload)
                .send()
                .await?;
            check_response(rsp).await
        })
        .await
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

/// Telegram HTML body. Title and summary are escaped; the link goes into an
/// attribute.
pub fn render_html(msg: &ArticleMessage) -> String {
    format!(
        "📰 <b>{title}</b>\n📅 <b>Date:</b> {date}\n🔗 <a href=\"{url}\">For Additional Reading</a>\n\n✍️ <b>Summary:</b>\n{summary}",
        title = html_escape::encode_text(&msg.title),
        date = msg.date_line(),
        url = html_escape::encode_double_quoted_attribute(&msg.url),
        summary = html_escape::encode_text(&msg.summary),
    )
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, msg: &ArticleMessage) -> Result<(), DeliveryError> {
        self.post_html(&render_html(msg)).await
    }

    async fn send_notice(&self, text: &str) -> Result<(), DeliveryError> {
        self.post_html(&html_escape::encode_text(text)).await
    }

    fn name(&self) -> &str {
        "telegram"
    }
}
