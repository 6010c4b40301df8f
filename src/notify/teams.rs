// src/notify/teams.rs
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::retry::{send_with_retry, RetryPolicy};
use super::{check_response, ArticleMessage, DeliveryError, Notifier};

/// Incoming-webhook sender posting Adaptive Card 1.4 messages.
#[derive(Clone)]
pub struct TeamsNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    policy: RetryPolicy,
}

impl TeamsNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(10),
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    async fn post_card(&self, card: &Value) -> Result<(), DeliveryError> {
        let (client, timeout, webhook) = (&self.client, self.timeout, self.webhook.as_str());
        send_with_retry(&self.policy, "teams", move || async move {
            let rsp = client
                .post(webhook)
                .timeout(timeout)
                .json(card)
                .send()
                .await?;
            check_response(rsp).await
        })
        .await
    }
}

fn wrap(body: Value) -> Value {
    json!({
        "type": "message",
        "attachments": [{
            "contentType": "application/vnd.microsoft.card.adaptive",
            "content": {
                "$schema": "http://adaptivecards.io/schemas/adaptive-card.json",
                "type": "AdaptiveCard",
                "version": "1.4",
                "body": body,
            }
        }]
    })
}

/// Adaptive Card payload: header, title, date line, summary, and a
/// "Further reading" action.
pub fn adaptive_card(msg: &ArticleMessage) -> Value {
    wrap(json!([
        {
            "type": "TextBlock",
            "text": "New Update",
            "weight": "Bolder",
            "size": "Medium",
            "color": "Accent"
        },
        {
            "type": "TextBlock",
            "text": msg.title,
            "wrap": true,
            "weight": "Bolder",
            "size": "Large"
        },
        {
            "type": "TextBlock",
            "text": format!("📅 Date: {}", msg.date_line()),
            "wrap": true
        },
        {
            "type": "TextBlock",
            "text": msg.summary,
            "wrap": true,
            "separator": true
        },
        {
            "type": "ActionSet",
            "actions": [{
                "type": "Action.OpenUrl",
                "title": "🔗 Further reading",
                "url": msg.url
            }]
        }
    ]))
}

pub fn notice_card(text: &str) -> Value {
    wrap(json!([{ "type": "TextBlock", "text": text, "wrap": true }]))
}

#[async_trait]
impl Notifier for TeamsNotifier {
    async fn send(&self, msg: &ArticleMessage) -> Result<(), DeliveryError> {
        self.post_card(&adaptive_card(msg)).await
    }

    async fn send_notice(&self, text: &str) -> Result<(), DeliveryError> {
        self.post_card(&notice_card(text)).await
    }

    fn name(&self) -> &str {
        "teams"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    #[test]
    fn card_shape() {
        let msg = ArticleMessage {
            title: "Budget passes".into(),
            published_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            published_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            url: "https://e.test/a".into(),
            summary: "Summary text".into(),
        };
        let card = adaptive_card(&msg);
        let content = &card["attachments"][0]["content"];
        assert_eq!(content["version"], "1.4");
        assert_eq!(content["body"][1]["text"], "Budget passes");
        assert_eq!(content["body"][2]["text"], "📅 Date: 2025-06-01 09:30:00");
        assert_eq!(content["body"][3]["text"], "Summary text");
        assert_eq!(
            content["body"][4]["actions"][0]["url"],
            "https://e.test/a"
        );
    }
}
