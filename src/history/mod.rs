// src/history/mod.rs
//! Durable history of handled articles.
//!
//! Two documents are kept:
//! - *posted*: ordered list of delivered articles. Grows only; nothing here
//!   deletes or rewrites an existing record.
//! - *skipped*: failed/deferred articles keyed by id, with a failure counter.
//!   Records expire on load once `fail_count >= 3` or the last failure is 14+
//!   days old.
//!
//! Both are loaded fresh and rewritten whole on every save. A missing or
//! corrupt document reads as empty history. Save errors are logged and
//! swallowed: the worst outcome is a re-delivery or re-attempt on the next run.

pub mod store;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::fingerprint::{content_hash, extract_source_from_url};
use crate::ingest::types::{whole_seconds, CandidateArticle};
use store::{DocumentStore, FileStore};

/// Failures at which a skipped record is dropped for good.
pub const MAX_FAIL_COUNT: u32 = 3;
/// Age (days since last failure) at which a skipped record is dropped.
pub const SKIP_RETENTION_DAYS: i64 = 14;

pub const DEFAULT_POSTED_FILE: &str = "posted_news_ud.json";
pub const DEFAULT_SKIPPED_FILE: &str = "skipped_news_ud.json";

/// Lenient field readers: older files carry "" where a value is absent.
mod lenient {
    use chrono::{NaiveDate, NaiveTime};
    use serde::{Deserialize, Deserializer};

    fn opt_str<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        let v: Option<serde_json::Value> = Option::deserialize(d)?;
        Ok(match v {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s),
            _ => None,
        })
    }

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(opt_str(d)?.unwrap_or_default())
    }

    pub fn opt_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        opt_str(d)
    }

    pub fn opt_date<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        Ok(opt_str(d)?.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()))
    }

    pub fn opt_time<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveTime>, D::Error> {
        Ok(opt_str(d)?.and_then(|s| {
            let s = s.trim();
            NaiveTime::parse_from_str(s, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S%.f"))
                .ok()
        }))
    }
}

fn default_fail_count() -> u32 {
    1
}

/// A delivered article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostedRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub url: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub text_hash: Option<String>,
    /// Final summarized text that was delivered.
    #[serde(default, deserialize_with = "lenient::string")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub source: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, deserialize_with = "lenient::opt_date")]
    pub published_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::opt_time")]
    pub published_time: Option<NaiveTime>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub rss_source: String,
}

/// A failed or deferred article, keyed by id in the skipped map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedRecord {
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub url: String,
    #[serde(default = "default_fail_count")]
    pub fail_count: u32,
    /// Date of the latest failure.
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "lenient::string")]
    pub reason: String,
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub text_hash: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub source: String,
    #[serde(default, deserialize_with = "lenient::opt_date")]
    pub published_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::opt_time")]
    pub published_time: Option<NaiveTime>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub rss_source: String,
}

impl SkippedRecord {
    /// Permanently failed, or stale relative to `today`.
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.fail_count >= MAX_FAIL_COUNT
            || today.signed_duration_since(self.date).num_days() >= SKIP_RETENTION_DAYS
    }
}

pub type SkippedMap = BTreeMap<String, SkippedRecord>;

/// One failed delivery attempt, as handed to [`HistoryStore::save_skipped`].
/// Absent fields are filled in at merge time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    pub id: String,
    pub title: String,
    pub url: String,
    pub reason: String,
    pub summary: String,
    pub text_hash: Option<String>,
    pub source: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub published_time: Option<NaiveTime>,
    pub rss_source: Option<String>,
}

impl FailureReport {
    pub fn from_candidate(c: &CandidateArticle, reason: impl Into<String>) -> Self {
        Self {
            id: c.id.clone(),
            title: c.title.clone(),
            url: c.url.clone(),
            reason: reason.into(),
            summary: c.summary.clone(),
            text_hash: c.text_hash.clone(),
            source: Some(c.source.clone()).filter(|s| !s.is_empty()),
            published_date: Some(c.published_date),
            published_time: Some(c.published_time),
            rss_source: Some(c.rss_source.clone()).filter(|s| !s.is_empty()),
        }
    }
}

/// Loads and saves the posted and skipped documents.
#[derive(Clone)]
pub struct HistoryStore {
    docs: Arc<dyn DocumentStore>,
    posted_key: String,
    skipped_key: String,
}

impl HistoryStore {
    pub fn new(
        docs: Arc<dyn DocumentStore>,
        posted_key: impl Into<String>,
        skipped_key: impl Into<String>,
    ) -> Self {
        Self {
            docs,
            posted_key: posted_key.into(),
            skipped_key: skipped_key.into(),
        }
    }

    /// File-backed store with the two documents at the given paths.
    pub fn files(posted_path: impl Into<String>, skipped_path: impl Into<String>) -> Self {
        Self::new(Arc::new(FileStore::new()), posted_path, skipped_path)
    }

    fn read_json(&self, key: &str) -> Option<serde_json::Value> {
        match self.docs.read(key) {
            Ok(Some(s)) => match serde_json::from_str(&s) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(location = %self.docs.locate(key), error = %e, "history document is corrupt, treating as empty");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(location = %self.docs.locate(key), error = %e, "history document unreadable, treating as empty");
                None
            }
        }
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T) -> bool {
        let body = match serde_json::to_string_pretty(value) {
            Ok(b) => b,
            Err(e) => {
                warn!(location = %self.docs.locate(key), error = %e, "history encode failed");
                return false;
            }
        };
        match self.docs.write(key, &body) {
            Ok(()) => true,
            Err(e) => {
                warn!(location = %self.docs.locate(key), error = %e, "history save failed");
                false
            }
        }
    }

    /// All posted records in stored order. Empty when the document is missing
    /// or corrupt.
    pub fn load_posted(&self) -> Vec<PostedRecord> {
        let Some(serde_json::Value::Array(items)) = self.read_json(&self.posted_key) else {
            return Vec::new();
        };
        items
            .into_iter()
            .filter_map(|v| match serde_json::from_value::<PostedRecord>(v) {
                Ok(r) => Some(r),
                Err(e) => {
                    debug!(error = %e, "dropping unreadable posted entry");
                    None
                }
            })
            .collect()
    }

    /// Replace the posted document with `records`.
    pub fn save_posted(&self, records: &[PostedRecord]) {
        if self.write_json(&self.posted_key, &records) {
            debug!(count = records.len(), "posted history saved");
        }
    }

    /// Skipped map exactly as stored, without expiry. Accepts both the keyed
    /// object form and a legacy array of records carrying an `id` field.
    fn read_skipped_raw(&self) -> SkippedMap {
        let mut out = SkippedMap::new();
        let entries: Vec<(String, serde_json::Value)> = match self.read_json(&self.skipped_key) {
            Some(serde_json::Value::Object(map)) => map.into_iter().collect(),
            Some(serde_json::Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| {
                    let id = v.get("id")?.as_str()?.to_string();
                    Some((id, v))
                })
                .collect(),
            _ => return out,
        };
        for (id, v) in entries {
            match serde_json::from_value::<SkippedRecord>(v) {
                Ok(r) => {
                    out.insert(id, r);
                }
                Err(e) => debug!(%id, error = %e, "dropping unreadable skipped entry"),
            }
        }
        out
    }

    /// Skipped map with expired records purged. The purged map is written back
    /// before returning, so repeated loads are idempotent.
    pub fn load_skipped(&self) -> SkippedMap {
        self.load_skipped_at(Local::now().date_naive())
    }

    pub fn load_skipped_at(&self, today: NaiveDate) -> SkippedMap {
        let raw = self.read_skipped_raw();
        let before = raw.len();
        let kept: SkippedMap = raw
            .into_iter()
            .filter(|(_, r)| !r.is_expired(today))
            .collect();
        let purged = before - kept.len();
        if purged > 0 {
            info!(purged, kept = kept.len(), "expired skipped records purged");
        }
        self.write_json(&self.skipped_key, &kept);
        kept
    }

    /// Merge `reports` into the stored skipped map by id and write it back.
    /// New ids start at `fail_count = 1`; known ids are incremented and their
    /// date, reason and article fields overwritten with the latest values.
    pub fn save_skipped(&self, reports: &[FailureReport]) {
        self.save_skipped_at(reports, Local::now().naive_local())
    }

    pub fn save_skipped_at(&self, reports: &[FailureReport], now: NaiveDateTime) {
        let mut map = self.read_skipped_raw();
        let today = now.date();
        let now_time = whole_seconds(now.time());

        for report in reports {
            let text_hash = report
                .text_hash
                .clone()
                .filter(|h| !h.is_empty())
                .or_else(|| content_hash(&report.summary));
            let source = report
                .source
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| extract_source_from_url(&report.url));
            let published_date = report.published_date.unwrap_or(today);
            let published_time = report.published_time.unwrap_or(now_time);
            let rss_source = report
                .rss_source
                .clone()
                .unwrap_or_else(|| "Unknown".to_string());
            let reason = if report.reason.is_empty() {
                "unknown".to_string()
            } else {
                report.reason.clone()
            };

            match map.get_mut(&report.id) {
                Some(existing) => {
                    existing.fail_count = existing.fail_count.saturating_add(1);
                    existing.date = today;
                    existing.reason = reason;
                    existing.text_hash = text_hash;
                    if !report.summary.is_empty() {
                        existing.summary = report.summary.clone();
                    }
                    if !source.is_empty() {
                        existing.source = source;
                    }
                    existing.published_date = Some(published_date);
                    existing.published_time = Some(published_time);
                    existing.rss_source = rss_source;
                }
                None => {
                    map.insert(
                        report.id.clone(),
                        SkippedRecord {
                            title: report.title.clone(),
                            url: report.url.clone(),
                            fail_count: 1,
                            date: today,
                            reason,
                            text_hash,
                            summary: report.summary.clone(),
                            source,
                            published_date: Some(published_date),
                            published_time: Some(published_time),
                            rss_source,
                        },
                    );
                }
            }
        }

        if self.write_json(&self.skipped_key, &map) {
            info!(new = reports.len(), total = map.len(), "skipped history updated");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::store::MemoryStore;
    use super::*;

    fn mem() -> (Arc<MemoryStore>, HistoryStore) {
        let docs = Arc::new(MemoryStore::new());
        let store = HistoryStore::new(docs.clone(), "posted", "skipped");
        (docs, store)
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn report(id: &str) -> FailureReport {
        FailureReport {
            id: id.into(),
            title: "Title".into(),
            url: "https://e.test/a".into(),
            reason: "boom".into(),
            summary: String::new(),
            text_hash: None,
            source: None,
            published_date: None,
            published_time: None,
            rss_source: None,
        }
    }

    #[test]
    fn corrupt_documents_read_as_empty() {
        let (docs, store) = mem();
        docs.insert_raw("posted", "{not json");
        docs.insert_raw("skipped", "[1, 2");
        assert!(store.load_posted().is_empty());
        assert!(store.load_skipped_at(day(2025, 1, 1)).is_empty());
    }

    #[test]
    fn save_skipped_fills_defaults() {
        let (_docs, store) = mem();
        let now = day(2025, 3, 10).and_hms_opt(8, 30, 15).unwrap();
        store.save_skipped_at(&[report("a")], now);
        let map = store.load_skipped_at(day(2025, 3, 10));
        let r = &map["a"];
        assert_eq!(r.fail_count, 1);
        assert_eq!(r.date, day(2025, 3, 10));
        assert_eq!(r.source, "e.test");
        assert_eq!(r.rss_source, "Unknown");
        assert_eq!(r.published_time, NaiveTime::from_hms_opt(8, 30, 15));
        // empty summary leaves the hash absent
        assert!(r.text_hash.is_none());
    }

    #[test]
    fn increment_keeps_old_summary_when_new_is_empty() {
        let (_docs, store) = mem();
        let now = day(2025, 3, 10).and_hms_opt(8, 0, 0).unwrap();
        let mut first = report("a");
        first.summary = "first summary".into();
        store.save_skipped_at(&[first], now);
        let mut second = report("a");
        second.reason = "second".into();
        store.save_skipped_at(&[second], now);

        let map = store.load_skipped_at(day(2025, 3, 10));
        assert_eq!(map["a"].fail_count, 2);
        assert_eq!(map["a"].reason, "second");
        assert_eq!(map["a"].summary, "first summary");
    }

    #[test]
    fn legacy_array_form_is_accepted() {
        let (docs, store) = mem();
        docs.insert_raw(
            "skipped",
            r#"[{"id":"x","title":"T","url":"u","fail_count":1,"date":"2025-03-09","reason":"r","text_hash":"","summary":"","source":"","published_date":"","published_time":"","rss_source":""}]"#,
        );
        let map = store.load_skipped_at(day(2025, 3, 10));
        assert_eq!(map.len(), 1);
        assert!(map["x"].text_hash.is_none());
        assert!(map["x"].published_date.is_none());
    }

    #[test]
    fn record_with_bad_date_is_dropped() {
        let (docs, store) = mem();
        docs.insert_raw(
            "skipped",
            r#"{"x":{"title":"T","url":"u","fail_count":1,"date":"yesterday"},
                "y":{"title":"T2","url":"u2","fail_count":1,"date":"2025-03-09"}}"#,
        );
        let map = store.load_skipped_at(day(2025, 3, 10));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["y"]);
    }

    #[test]
    fn save_failure_does_not_panic() {
        let (docs, store) = mem();
        docs.set_fail_writes(true);
        store.save_posted(&[]);
        store.save_skipped(&[report("a")]);
        assert!(docs.raw("posted").is_none());
    }

    #[test]
    fn expiry_boundaries() {
        let rec = SkippedRecord {
            title: String::new(),
            url: String::new(),
            fail_count: 1,
            date: day(2025, 3, 1),
            reason: String::new(),
            text_hash: None,
            summary: String::new(),
            source: String::new(),
            published_date: None,
            published_time: None,
            rss_source: String::new(),
        };
        assert!(!rec.is_expired(day(2025, 3, 14))); // 13 days
        assert!(rec.is_expired(day(2025, 3, 15))); // 14 days
        assert!(!rec.is_expired(day(2025, 2, 20))); // dated in the future
        let exhausted = SkippedRecord {
            fail_count: 3,
            ..rec
        };
        assert!(exhausted.is_expired(day(2025, 3, 1)));
    }
}
