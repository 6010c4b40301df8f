// src/config/app.rs
use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::history::{DEFAULT_POSTED_FILE, DEFAULT_SKIPPED_FILE};
use crate::ingest::config::{feeds_from_list, load_feeds_from, parse_label_mappings, FeedSpec};
use crate::lock::DEFAULT_LOCK_FILE;
use crate::notify::{NotifierMux, TeamsNotifier, TelegramNotifier};
use crate::summarize::{ExtractiveLoader, ModelLoader, OpenAiLoader};

pub const DEFAULT_TIME_RANGE_DAYS: i64 = 1;
/// Upper bound for `FEED_TIME_RANGE_DAYS`, about ten years.
pub const MAX_TIME_RANGE_DAYS: i64 = 3650;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarizerKind {
    Extractive,
    OpenAi,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub feeds: Vec<FeedSpec>,
    pub telegram: Option<TelegramConfig>,
    pub teams_webhook: Option<String>,
    pub posted_file: PathBuf,
    pub skipped_file: PathBuf,
    pub lock_file: PathBuf,
    pub time_range_days: i64,
    pub summarizer: SummarizerKind,
    pub openai_api_key: Option<String>,
    pub openai_model: Option<String>,
    pub record_rejections: bool,
    pub announce_run_start: bool,
    pub metrics_textfile: Option<PathBuf>,
}

fn flag(v: Option<String>) -> bool {
    matches!(
        v.as_deref().map(|s| s.trim().to_ascii_lowercase()).as_deref(),
        Some("1" | "true" | "yes" | "on")
    )
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|k| env::var(k).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut feeds = match get("FEEDS_CONFIG_PATH") {
            Some(p) => load_feeds_from(&PathBuf::from(&p))
                .with_context(|| format!("FEEDS_CONFIG_PATH={p}"))?,
            None => Vec::new(),
        };
        let mappings = get("RSS_COUNTRY_MAPPINGS")
            .map(|m| parse_label_mappings(&m))
            .unwrap_or_default();
        if let Some(list) = get("RSS_FEED_URL") {
            for f in feeds_from_list(&list, &mappings) {
                if !feeds.iter().any(|x| x.url == f.url) {
                    feeds.push(f);
                }
            }
        }
        if feeds.is_empty() {
            bail!("no feeds configured: set RSS_FEED_URL or FEEDS_CONFIG_PATH");
        }

        let telegram = match (get("TELEGRAM_BOT_TOKEN"), get("TELEGRAM_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig { bot_token, chat_id }),
            (None, None) => None,
            _ => {
                warn!("TELEGRAM_BOT_TOKEN and TELEGRAM_CHAT_ID must both be set; telegram disabled");
                None
            }
        };
        let teams_webhook = get("TEAMS_WEBHOOK_URL");
        if telegram.is_none() && teams_webhook.is_none() {
            warn!("no delivery channel configured; every article will fail delivery");
        }

        let time_range_days = match get("FEED_TIME_RANGE_DAYS") {
            Some(v) => v
                .parse::<i64>()
                .ok()
                .filter(|d| (0..=MAX_TIME_RANGE_DAYS).contains(d))
                .with_context(|| {
                    format!("FEED_TIME_RANGE_DAYS must be an integer in 0..={MAX_TIME_RANGE_DAYS}, got {v:?}")
                })?,
            None => DEFAULT_TIME_RANGE_DAYS,
        };

        let summarizer = match get("SUMMARIZER").map(|s| s.to_ascii_lowercase()).as_deref() {
            None | Some("extractive") => SummarizerKind::Extractive,
            Some("openai") => SummarizerKind::OpenAi,
            Some(other) => bail!("unsupported SUMMARIZER {other:?} (expected extractive|openai)"),
        };

        let cfg = Self {
            feeds,
            telegram,
            teams_webhook,
            posted_file: get("POSTED_NEWS_FILE")
                .unwrap_or_else(|| DEFAULT_POSTED_FILE.to_string())
                .into(),
            skipped_file: get("SKIPPED_NEWS_FILE")
                .unwrap_or_else(|| DEFAULT_SKIPPED_FILE.to_string())
                .into(),
            lock_file: get("LOCK_FILE")
                .unwrap_or_else(|| DEFAULT_LOCK_FILE.to_string())
                .into(),
            time_range_days,
            summarizer,
            openai_api_key: get("OPENAI_API_KEY"),
            openai_model: get("OPENAI_MODEL"),
            record_rejections: flag(get("RECORD_REJECTIONS")),
            announce_run_start: flag(get("ANNOUNCE_RUN_START")),
            metrics_textfile: get("METRICS_TEXTFILE").map(PathBuf::from),
        };
        info!(
            feeds = cfg.feeds.len(),
            telegram = cfg.telegram.is_some(),
            teams = cfg.teams_webhook.is_some(),
            summarizer = ?cfg.summarizer,
            "configuration loaded"
        );
        Ok(cfg)
    }

    pub fn notifiers(&self) -> NotifierMux {
        let mut mux = NotifierMux::new();
        if let Some(t) = &self.telegram {
            mux.push(Box::new(TelegramNotifier::new(
                t.bot_token.clone(),
                t.chat_id.clone(),
            )));
        }
        if let Some(w) = &self.teams_webhook {
            mux.push(Box::new(TeamsNotifier::new(w.clone())));
        }
        mux
    }

    pub fn model_loader(&self) -> Box<dyn ModelLoader> {
        match self.summarizer {
            SummarizerKind::Extractive => Box::new(ExtractiveLoader),
            SummarizerKind::OpenAi => Box::new(OpenAiLoader::new(
                self.openai_api_key.clone(),
                self.openai_model.clone(),
            )),
        }
    }
}
