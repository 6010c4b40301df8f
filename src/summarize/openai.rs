// src/summarize/openai.rs
//! Abstractive summaries via the OpenAI Chat Completions API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ModelLoader, SummarizeError, SummaryModel, SummaryParams};

const ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

pub struct OpenAiModel {
    http: reqwest::Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl OpenAiModel {
    pub fn new(api_key: String, model: Option<&str>) -> Result<Self, SummarizeError> {
        if api_key.trim().is_empty() {
            return Err(SummarizeError::Load("OPENAI_API_KEY is not set".into()));
        }
        let http = reqwest::Client::builder()
            .user_agent("news-relay/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SummarizeError::Load(format!("http client: {e}")))?;
        Ok(Self {
            http,
            api_key,
            model: model.unwrap_or(DEFAULT_MODEL).to_string(),
            endpoint: ENDPOINT.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Serialize)]
struct Msg<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct Req<'a> {
    model: &'a str,
    messages: Vec<Msg<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct Resp {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMsg,
}

#[derive(Deserialize)]
struct ChoiceMsg {
    content: String,
}

fn system_prompt(params: &SummaryParams) -> String {
    format!(
        "You summarize news articles. Write a neutral, factual summary of {} to {} words. \
         Plain text, no headings, no emojis. Output only the summary.",
        params.min_length, params.max_length
    )
}

#[async_trait]
impl SummaryModel for OpenAiModel {
    async fn summarize(
        &self,
        text: &str,
        params: &SummaryParams,
    ) -> Result<String, SummarizeError> {
        let sys = system_prompt(params);
        let req = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: &sys,
                },
                Msg {
                    role: "user",
                    content: text,
                },
            ],
            temperature: 0.2,
            // tokens run ahead of words; leave headroom
            max_tokens: (params.max_length as u32).saturating_mul(2),
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await
            .map_err(|e| SummarizeError::Model(format!("request: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SummarizeError::Model(format!("HTTP {status}")));
        }
        let body: Resp = resp
            .json()
            .await
            .map_err(|e| SummarizeError::Model(format!("decode: {e}")))?;
        Ok(body
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "openai"
    }
}

pub struct OpenAiLoader {
    api_key: Option<String>,
    model: Option<String>,
}

impl OpenAiLoader {
    pub fn new(api_key: Option<String>, model: Option<String>) -> Self {
        Self { api_key, model }
    }
}

impl ModelLoader for OpenAiLoader {
    fn load(&self) -> Result<Box<dyn SummaryModel>, SummarizeError> {
        let key = self.api_key.clone().unwrap_or_default();
        Ok(Box::new(OpenAiModel::new(key, self.model.as_deref())?))
    }
    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_requires_key() {
        let err = OpenAiLoader::new(None, None).load().err().unwrap();
        assert!(matches!(err, SummarizeError::Load(_)));
        assert!(OpenAiLoader::new(Some("sk-test".into()), None).load().is_ok());
    }

    #[test]
    fn request_shape() {
        let params = SummaryParams {
            max_length: 120,
            min_length: 60,
        };
        let sys = system_prompt(&params);
        let req = Req {
            model: DEFAULT_MODEL,
            messages: vec![Msg {
                role: "system",
                content: &sys,
            }],
            temperature: 0.2,
            max_tokens: 240,
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["model"], "gpt-4o-mini");
        assert_eq!(v["messages"][0]["role"], "system");
        assert!(v["messages"][0]["content"]
            .as_str()
            .unwrap()
            .contains("60 to 120 words"));
    }
}
