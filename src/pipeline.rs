// src/pipeline.rs
//! One full run: retrieve, reconcile, then fetch, summarize, deliver and
//! record each new article in input order.

use std::time::{Duration, Instant};

use anyhow::{anyhow, bail, Result};
use metrics::counter;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::filter::{filter_new_articles, RejectReason};
use crate::fingerprint::{normalize_title_for_display, normalize_url};
use crate::history::HistoryStore;
use crate::ingest::fulltext::{ArticleFetcher, HttpArticleFetcher};
use crate::ingest::providers::rss::RssFeedProvider;
use crate::ingest::retrieve;
use crate::ingest::types::{CandidateArticle, FeedProvider};
use crate::notify::{ArticleMessage, Notifier};
use crate::recorder::{check_full_text, check_summary, DeliveryRecorder, FailureReason};
use crate::summarize::SummarizerHandle;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Also route filter rejections (except exhausted retries) to the
    /// skipped store.
    pub record_rejections: bool,
    pub announce_run_start: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub retrieved: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub posted: usize,
    pub failed: usize,
    pub duration: Duration,
}

pub struct Pipeline {
    providers: Vec<Box<dyn FeedProvider>>,
    history: HistoryStore,
    fetcher: Box<dyn ArticleFetcher>,
    summarizer: SummarizerHandle,
    notifier: Box<dyn Notifier>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        providers: Vec<Box<dyn FeedProvider>>,
        history: HistoryStore,
        fetcher: Box<dyn ArticleFetcher>,
        summarizer: SummarizerHandle,
        notifier: Box<dyn Notifier>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            providers,
            history,
            fetcher,
            summarizer,
            notifier,
            config,
        }
    }

    /// Production wiring: RSS providers, file-backed history, HTTP fetcher,
    /// the configured summarizer and delivery channels.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let mut providers: Vec<Box<dyn FeedProvider>> = Vec::with_capacity(cfg.feeds.len());
        for f in &cfg.feeds {
            providers.push(Box::new(
                RssFeedProvider::from_url(&f.url, &f.label)?.with_time_range(cfg.time_range_days),
            ));
        }
        Ok(Self::new(
            providers,
            HistoryStore::files(
                cfg.posted_file.to_string_lossy(),
                cfg.skipped_file.to_string_lossy(),
            ),
            Box::new(HttpArticleFetcher::new()?),
            SummarizerHandle::new(cfg.model_loader()),
            Box::new(cfg.notifiers()),
            PipelineConfig {
                record_rejections: cfg.record_rejections,
                announce_run_start: cfg.announce_run_start,
            },
        ))
    }

    /// Operator-facing text on every channel; failures are only logged.
    pub async fn notify_operator(&self, text: &str) {
        if let Err(e) = self.notifier.send_notice(text).await {
            warn!(error = %e, "operator notice not delivered");
        }
    }

    pub async fn run_once(&mut self) -> Result<RunReport> {
        crate::metrics::ensure_metrics_described();
        let t0 = Instant::now();

        if self.config.announce_run_start {
            let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
            self.notify_operator(&format!("Run started at {now}")).await;
        }

        let retrieval = retrieve(&self.providers).await;
        if retrieval.all_failed(self.providers.len()) {
            bail!("all {} feeds failed to load", self.providers.len());
        }
        let candidates = retrieval.articles;
        let retrieved = candidates.len();

        let posted = self.history.load_posted();
        let skipped = self.history.load_skipped();
        let outcome = filter_new_articles(candidates, &posted, &skipped);
        for r in &outcome.rejected {
            counter!("filter_rejected_total", "reason" => r.reason.as_str()).increment(1);
        }
        info!(
            retrieved,
            accepted = outcome.accepted.len(),
            rejected = outcome.rejected.len(),
            "reconciliation done"
        );

        let mut recorder = DeliveryRecorder::with_posted(self.history.clone(), posted);
        if self.config.record_rejections {
            for r in outcome
                .rejected
                .iter()
                .filter(|r| r.reason != RejectReason::ExhaustedRetries)
            {
                recorder.record_failure(&r.candidate, &FailureReason::Rejected(r.reason));
            }
        }

        let total = outcome.accepted.len();
        for (i, candidate) in outcome.accepted.iter().enumerate() {
            info!(n = i + 1, total, id = %candidate.id, title = %candidate.title, "processing article");
            match self.process(candidate).await {
                Ok(summary) => {
                    counter!("articles_posted_total").increment(1);
                    recorder.record_success(candidate, &summary);
                }
                Err(reason) => {
                    counter!("articles_failed_total", "stage" => reason.stage()).increment(1);
                    recorder.record_failure(candidate, &reason);
                }
            }
        }

        let rec = recorder.finish();
        let report = RunReport {
            retrieved,
            accepted: total,
            rejected: outcome.rejected.len(),
            posted: rec.posted,
            failed: rec.failed,
            duration: t0.elapsed(),
        };
        info!(
            retrieved = report.retrieved,
            accepted = report.accepted,
            rejected = report.rejected,
            posted = report.posted,
            failed = report.failed,
            duration_ms = report.duration.as_millis() as u64,
            "run finished"
        );
        Ok(report)
    }

    /// Run on a separate task so a panic anywhere in the run comes back as an
    /// error instead of unwinding through the caller.
    pub async fn run_detached(mut self) -> Result<RunReport> {
        match tokio::spawn(async move { self.run_once().await }).await {
            Ok(res) => res,
            Err(e) if e.is_panic() => {
                let payload = e.into_panic();
                let msg = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Err(anyhow!("run panicked: {msg}"))
            }
            Err(e) => Err(anyhow!("run task failed: {e}")),
        }
    }

    /// Fetch, gate, summarize, gate, deliver. Returns the delivered summary.
    async fn process(&mut self, candidate: &CandidateArticle) -> Result<String, FailureReason> {
        let url = normalize_url(&candidate.url);
        let title = normalize_title_for_display(&candidate.title);

        let text = self
            .fetcher
            .fetch_full_text(&url)
            .await
            .map_err(|e| FailureReason::FetchFailed(format!("{e:#}")))?;
        check_full_text(&text)?;

        let summary = self
            .summarizer
            .summarize(&title, &text)
            .await
            .map_err(|e| FailureReason::SummarizationFailed(e.to_string()))?;
        check_summary(&summary)?;

        let msg = ArticleMessage::new(&title, &url, candidate, &summary);
        self.notifier
            .send(&msg)
            .await
            .map_err(|e| FailureReason::DeliveryFailed(e.to_string()))?;
        Ok(msg.summary)
    }
}
