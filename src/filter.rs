// src/filter.rs
//! # Reconciliation filter
//! Splits a freshly retrieved batch into genuinely new articles and rejects,
//! using the three fingerprints against posted history, skipped history and
//! the batch itself.
//!
//! Checks run in a fixed order per candidate: missing identity → title → URL →
//! content hash → exhausted retries. The first failing check is the recorded
//! reason. Input order is preserved; within a batch the earliest candidate wins.

use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use crate::fingerprint::{normalize_title_for_matching, normalize_url};
use crate::history::{PostedRecord, SkippedMap, MAX_FAIL_COUNT};
use crate::ingest::types::CandidateArticle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    MissingIdentity,
    DuplicateTitle,
    DuplicateUrl,
    DuplicateHash,
    ExhaustedRetries,
}

impl RejectReason {
    /// Stable label for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MissingIdentity => "missing_identity",
            RejectReason::DuplicateTitle => "duplicate_title",
            RejectReason::DuplicateUrl => "duplicate_url",
            RejectReason::DuplicateHash => "duplicate_hash",
            RejectReason::ExhaustedRetries => "exhausted_retries",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::MissingIdentity => "missing title or URL",
            RejectReason::DuplicateTitle => "duplicate title",
            RejectReason::DuplicateUrl => "duplicate URL",
            RejectReason::DuplicateHash => "duplicate hash",
            RejectReason::ExhaustedRetries => "exhausted retries",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub candidate: CandidateArticle,
    pub reason: RejectReason,
}

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    /// New articles, in input order, each with `text_hash` attached.
    pub accepted: Vec<CandidateArticle>,
    pub rejected: Vec<Rejection>,
}

impl FilterOutcome {
    pub fn count(&self, reason: RejectReason) -> usize {
        self.rejected.iter().filter(|r| r.reason == reason).count()
    }
}

#[derive(Default)]
struct KeySet {
    titles: HashSet<String>,
    urls: HashSet<String>,
    hashes: HashSet<String>,
}

impl KeySet {
    fn add(&mut self, title: &str, url: &str, hash: Option<&str>) {
        self.titles.insert(normalize_title_for_matching(title));
        self.urls.insert(normalize_url(url));
        if let Some(h) = hash.filter(|h| !h.is_empty()) {
            self.hashes.insert(h.to_string());
        }
    }
}

/// Partition `candidates` against history. Pure: stores are passed in already
/// loaded and nothing is written.
pub fn filter_new_articles(
    candidates: Vec<CandidateArticle>,
    posted: &[PostedRecord],
    skipped: &SkippedMap,
) -> FilterOutcome {
    let mut posted_keys = KeySet::default();
    for p in posted {
        posted_keys.add(&p.title, &p.url, p.text_hash.as_deref());
    }
    let mut skipped_keys = KeySet::default();
    for s in skipped.values() {
        skipped_keys.add(&s.title, &s.url, s.text_hash.as_deref());
    }
    let mut batch = KeySet::default();

    let mut out = FilterOutcome::default();

    for mut candidate in candidates {
        let title = normalize_title_for_matching(&candidate.title);
        let url = normalize_url(&candidate.url);

        let reason = if title.is_empty() || url.is_empty() {
            Some(RejectReason::MissingIdentity)
        } else if posted_keys.titles.contains(&title)
            || skipped_keys.titles.contains(&title)
            || batch.titles.contains(&title)
        {
            Some(RejectReason::DuplicateTitle)
        } else if posted_keys.urls.contains(&url)
            || skipped_keys.urls.contains(&url)
            || batch.urls.contains(&url)
        {
            Some(RejectReason::DuplicateUrl)
        } else if candidate.ensure_hash().is_some_and(|h| {
            posted_keys.hashes.contains(h)
                || skipped_keys.hashes.contains(h)
                || batch.hashes.contains(h)
        }) {
            Some(RejectReason::DuplicateHash)
        } else if skipped
            .get(&candidate.id)
            .is_some_and(|s| s.fail_count >= MAX_FAIL_COUNT)
        {
            Some(RejectReason::ExhaustedRetries)
        } else {
            None
        };

        match reason {
            Some(reason) => {
                debug!(id = %candidate.id, %title, %url, %reason, "candidate rejected");
                out.rejected.push(Rejection { candidate, reason });
            }
            None => {
                batch.titles.insert(title);
                batch.urls.insert(url);
                if let Some(h) = candidate.text_hash.clone() {
                    batch.hashes.insert(h);
                }
                out.accepted.push(candidate);
            }
        }
    }

    debug!(
        accepted = out.accepted.len(),
        rejected = out.rejected.len(),
        "reconciliation done"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn cand(id: &str, title: &str, url: &str, summary: &str) -> CandidateArticle {
        CandidateArticle {
            id: id.into(),
            title: title.into(),
            url: url.into(),
            summary: summary.into(),
            published_date: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            published_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            source: "e.test".into(),
            keywords: vec![],
            text_hash: None,
            rss_source: "Unknown".into(),
        }
    }

    #[test]
    fn missing_identity_wins_over_everything() {
        let out = filter_new_articles(
            vec![cand("1", "<b></b>", "https://e.test/a", "text")],
            &[],
            &SkippedMap::new(),
        );
        assert!(out.accepted.is_empty());
        assert_eq!(out.rejected[0].reason, RejectReason::MissingIdentity);
    }

    #[test]
    fn title_checked_before_url() {
        let posted = vec![PostedRecord {
            title: "Same Story - Reuters".into(),
            url: "https://e.test/a?utm=1".into(),
            text_hash: None,
            summary: String::new(),
            source: String::new(),
            keywords: vec![],
            published_date: None,
            published_time: None,
            rss_source: String::new(),
        }];
        let out = filter_new_articles(
            vec![cand("1", "same story", "https://e.test/a", "x y z")],
            &posted,
            &SkippedMap::new(),
        );
        assert_eq!(out.rejected[0].reason, RejectReason::DuplicateTitle);
    }

    #[test]
    fn url_duplicate_within_batch() {
        let out = filter_new_articles(
            vec![
                cand("1", "First", "https://e.test/a?x=1", "alpha"),
                cand("2", "Second", "https://e.test/a#frag", "beta"),
            ],
            &[],
            &SkippedMap::new(),
        );
        assert_eq!(out.accepted.len(), 1);
        assert_eq!(out.accepted[0].id, "1");
        assert_eq!(out.rejected[0].reason, RejectReason::DuplicateUrl);
    }

    #[test]
    fn empty_summary_skips_hash_check() {
        let out = filter_new_articles(
            vec![
                cand("1", "First", "https://e.test/a", ""),
                cand("2", "Second", "https://e.test/b", ""),
            ],
            &[],
            &SkippedMap::new(),
        );
        assert_eq!(out.accepted.len(), 2);
        assert!(out.accepted.iter().all(|c| c.text_hash.is_none()));
    }
}
