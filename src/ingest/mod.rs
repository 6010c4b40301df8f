// src/ingest/mod.rs
pub mod config;
pub mod fulltext;
pub mod providers;
pub mod types;

use metrics::counter;

use crate::ingest::types::{CandidateArticle, FeedProvider};

/// Outcome of one pass over the providers.
#[derive(Debug, Default)]
pub struct Retrieval {
    pub articles: Vec<CandidateArticle>,
    /// Providers whose fetch or parse failed.
    pub failed: usize,
}

impl Retrieval {
    /// True when there were providers and none of them delivered a feed.
    pub fn all_failed(&self, providers: usize) -> bool {
        providers > 0 && self.failed == providers
    }
}

/// Pull every provider once and concatenate results in provider order.
/// A failing provider is logged and skipped; the others still contribute.
pub async fn retrieve(providers: &[Box<dyn FeedProvider>]) -> Retrieval {
    crate::metrics::ensure_metrics_described();

    let mut out = Retrieval::default();
    for p in providers {
        match p.fetch_latest().await {
            Ok(mut v) => {
                tracing::debug!(provider = p.name(), count = v.len(), "provider fetched");
                out.articles.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(error = ?e, provider = p.name(), "provider error");
                counter!("ingest_provider_errors_total").increment(1);
                out.failed += 1;
            }
        }
    }
    tracing::info!(
        providers = providers.len(),
        failed = out.failed,
        candidates = out.articles.len(),
        "retrieval done"
    );
    out
}

pub async fn retrieve_all(providers: &[Box<dyn FeedProvider>]) -> Vec<CandidateArticle> {
    retrieve(providers).await.articles
}
