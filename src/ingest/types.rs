// src/ingest/types.rs
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};

use crate::fingerprint::content_hash;

/// One article observed during a retrieval cycle.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CandidateArticle {
    /// Feed guid when present, otherwise synthesized (see [`synthesize_id`]).
    pub id: String,
    pub title: String,
    pub url: String,
    /// Raw feed summary; may still carry markup.
    pub summary: String,
    pub published_date: NaiveDate,
    pub published_time: NaiveTime,
    /// Host derived from `url`.
    pub source: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub text_hash: Option<String>,
    /// Label of the originating feed (country/region).
    pub rss_source: String,
}

impl CandidateArticle {
    /// Content hash of the summary, computed on first use and cached.
    pub fn ensure_hash(&mut self) -> Option<&str> {
        if self.text_hash.is_none() {
            self.text_hash = content_hash(&self.summary);
        }
        self.text_hash.as_deref()
    }
}

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Id for entries without a guid. Millisecond timestamp plus a process-wide
/// counter, so two entries parsed in the same millisecond still differ.
pub fn synthesize_id(now: DateTime<Utc>) -> String {
    let seq = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("gen-{}-{}", now.timestamp_millis(), seq)
}

/// Wall-clock time truncated to whole seconds (the stored display format).
pub fn whole_seconds(t: NaiveTime) -> NaiveTime {
    t.with_nanosecond(0).unwrap_or(t)
}

#[async_trait::async_trait]
pub trait FeedProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<CandidateArticle>>;
    fn name(&self) -> &str;
}
