// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod filter;
pub mod fingerprint;
pub mod history;
pub mod ingest;
pub mod lock;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod recorder;
pub mod summarize;

// ---- Re-exports for stable public API ----
pub use crate::config::AppConfig;
pub use crate::filter::{filter_new_articles, FilterOutcome, RejectReason};
pub use crate::history::{HistoryStore, PostedRecord, SkippedRecord};
pub use crate::ingest::types::CandidateArticle;
pub use crate::notify::NotifierMux;
pub use crate::pipeline::{Pipeline, PipelineConfig, RunReport};
