// src/recorder.rs
//! Writes delivery outcomes back into history.
//!
//! Successes are appended to the posted working set and the whole posted
//! document is saved immediately, once per success. Failures are buffered and
//! merged into the skipped document once, in [`DeliveryRecorder::finish`].

use std::fmt;

use tracing::{info, warn};

use crate::filter::RejectReason;
use crate::fingerprint::{
    content_hash, extract_source_from_url, normalize_title_for_display, normalize_url, word_count,
};
use crate::history::{FailureReport, HistoryStore, PostedRecord};
use crate::ingest::types::CandidateArticle;

/// Extracted article text shorter than this is not worth summarizing.
pub const MIN_FULL_TEXT_WORDS: usize = 10;
/// Summaries shorter than this are not delivered.
pub const MIN_SUMMARY_WORDS: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    FetchFailed(String),
    FullTextTooShort { words: usize },
    SummarizationFailed(String),
    SummaryTooShort { words: usize },
    DeliveryFailed(String),
    Rejected(RejectReason),
}

impl FailureReason {
    /// Pipeline stage label for metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            FailureReason::FetchFailed(_) => "fetch",
            FailureReason::FullTextTooShort { .. } => "full_text",
            FailureReason::SummarizationFailed(_) => "summarize",
            FailureReason::SummaryTooShort { .. } => "summary",
            FailureReason::DeliveryFailed(_) => "delivery",
            FailureReason::Rejected(_) => "filter",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::FetchFailed(e) => write!(f, "Error while fetching article: {e}"),
            FailureReason::FullTextTooShort { words } => {
                write!(f, "Article text is empty or too short ({words} words)")
            }
            FailureReason::SummarizationFailed(e) => write!(f, "Error during summarization: {e}"),
            FailureReason::SummaryTooShort { words } => {
                write!(f, "Final summary is too short or empty ({words} words)")
            }
            FailureReason::DeliveryFailed(e) => write!(f, "Error sending message: {e}"),
            FailureReason::Rejected(r) => write!(f, "Rejected: {r}"),
        }
    }
}

/// Gate applied to extracted article text before summarizing.
pub fn check_full_text(text: &str) -> Result<(), FailureReason> {
    let words = word_count(text);
    if words < MIN_FULL_TEXT_WORDS {
        return Err(FailureReason::FullTextTooShort { words });
    }
    Ok(())
}

/// Gate applied to the final summary before delivery.
pub fn check_summary(summary: &str) -> Result<(), FailureReason> {
    let words = word_count(summary);
    if words < MIN_SUMMARY_WORDS {
        return Err(FailureReason::SummaryTooShort { words });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecorderReport {
    pub posted: usize,
    pub failed: usize,
}

pub struct DeliveryRecorder {
    store: HistoryStore,
    posted: Vec<PostedRecord>,
    failures: Vec<FailureReport>,
    posted_this_run: usize,
}

impl DeliveryRecorder {
    /// Starts from the currently persisted posted list.
    pub fn new(store: HistoryStore) -> Self {
        let posted = store.load_posted();
        Self::with_posted(store, posted)
    }

    /// Starts from an already loaded posted list.
    pub fn with_posted(store: HistoryStore, posted: Vec<PostedRecord>) -> Self {
        Self {
            store,
            posted,
            failures: Vec::new(),
            posted_this_run: 0,
        }
    }

    /// Current posted working set, including this run's successes.
    pub fn posted(&self) -> &[PostedRecord] {
        &self.posted
    }

    pub fn pending_failures(&self) -> &[FailureReport] {
        &self.failures
    }

    /// Record a delivered article and persist the whole posted list now.
    pub fn record_success(&mut self, candidate: &CandidateArticle, final_summary: &str) {
        let url = normalize_url(&candidate.url);
        let source = if candidate.source.is_empty() {
            extract_source_from_url(&url)
        } else {
            candidate.source.clone()
        };
        let record = PostedRecord {
            title: normalize_title_for_display(&candidate.title),
            url,
            text_hash: candidate
                .text_hash
                .clone()
                .or_else(|| content_hash(&candidate.summary)),
            summary: final_summary.trim().to_string(),
            source,
            keywords: candidate.keywords.clone(),
            published_date: Some(candidate.published_date),
            published_time: Some(candidate.published_time),
            rss_source: candidate.rss_source.clone(),
        };
        info!(id = %candidate.id, title = %record.title, "article delivered");
        self.posted.push(record);
        self.posted_this_run += 1;
        self.store.save_posted(&self.posted);
    }

    /// Buffer a failure; persisted by [`finish`](Self::finish).
    pub fn record_failure(&mut self, candidate: &CandidateArticle, reason: &FailureReason) {
        warn!(id = %candidate.id, title = %candidate.title, %reason, "article failed");
        let mut report = FailureReport::from_candidate(candidate, reason.to_string());
        report.title = normalize_title_for_display(&candidate.title);
        report.url = normalize_url(&candidate.url);
        self.failures.push(report);
    }

    /// Flush buffered failures in a single skipped-store merge.
    pub fn finish(self) -> RecorderReport {
        let failed = self.failures.len();
        if failed > 0 {
            self.store.save_skipped(&self.failures);
        }
        RecorderReport {
            posted: self.posted_this_run,
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gates_use_word_counts() {
        assert!(check_full_text("one two three four five six seven eight nine").is_err());
        assert!(check_full_text("one two three four five six seven eight nine ten").is_ok());
        let nineteen = vec!["w"; 19].join(" ");
        assert_eq!(
            check_summary(&nineteen),
            Err(FailureReason::SummaryTooShort { words: 19 })
        );
        assert!(check_summary(&vec!["w"; 20].join(" ")).is_ok());
        assert!(check_summary("   ").is_err());
    }

    #[test]
    fn reasons_render_for_humans() {
        assert_eq!(
            FailureReason::Rejected(RejectReason::DuplicateHash).to_string(),
            "Rejected: duplicate hash"
        );
        assert!(FailureReason::FetchFailed("timeout".into())
            .to_string()
            .contains("timeout"));
    }
}
