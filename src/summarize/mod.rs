// src/summarize/mod.rs
//! Article summarization behind a lazily initialized model handle.
//!
//! The handle is owned by the pipeline. A model is loaded on first use; a
//! model fault drops it back to uninitialized and the next attempt loads it
//! again. Attempts per article are capped at [`MAX_SUMMARY_ATTEMPTS`].

pub mod extractive;
pub mod openai;

use async_trait::async_trait;
use metrics::counter;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::fingerprint::{truncate_words, word_count};

pub use extractive::{ExtractiveLoader, ExtractiveModel};
pub use openai::{OpenAiLoader, OpenAiModel};

pub const MAX_SUMMARY_ATTEMPTS: usize = 2;
/// Texts shorter than this are passed through untouched.
pub const SHORT_TEXT_WORDS: usize = 30;
/// Model input is cut to this many words.
pub const MAX_INPUT_WORDS: usize = 500;

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("model load failed: {0}")]
    Load(String),
    #[error("model fault: {0}")]
    Model(String),
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: usize, last: String },
}

/// Output length bounds, in words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SummaryParams {
    pub max_length: usize,
    pub min_length: usize,
}

impl SummaryParams {
    pub fn for_word_count(words: usize) -> Self {
        let max_length = (words * 2).min(200);
        let min_length = (max_length / 2).max(20);
        Self {
            max_length,
            min_length,
        }
    }
}

#[async_trait]
pub trait SummaryModel: Send + Sync {
    async fn summarize(&self, text: &str, params: &SummaryParams)
        -> Result<String, SummarizeError>;
    fn name(&self) -> &str;
}

pub trait ModelLoader: Send + Sync {
    fn load(&self) -> Result<Box<dyn SummaryModel>, SummarizeError>;
    fn name(&self) -> &str;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStatus {
    Uninitialized,
    Ready,
    Failed,
}

enum ModelState {
    Uninitialized,
    Ready(Box<dyn SummaryModel>),
    Failed(String),
}

/// What the model should see for one article, or a pass-through result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreparedInput {
    PassThrough(String),
    Model { text: String, params: SummaryParams },
}

pub fn prepare_input(title: &str, text: &str) -> PreparedInput {
    let text = text.trim();
    if text.is_empty() {
        return PreparedInput::PassThrough(String::new());
    }
    let words = word_count(text);
    if words < SHORT_TEXT_WORDS {
        return PreparedInput::PassThrough(text.to_string());
    }
    let title = title.trim();
    let joined = if title.is_empty() {
        text.to_string()
    } else {
        format!("{title}. {text}")
    };
    PreparedInput::Model {
        text: truncate_words(&joined, MAX_INPUT_WORDS),
        params: SummaryParams::for_word_count(words),
    }
}

pub struct SummarizerHandle {
    loader: Box<dyn ModelLoader>,
    state: ModelState,
}

impl SummarizerHandle {
    pub fn new(loader: Box<dyn ModelLoader>) -> Self {
        Self {
            loader,
            state: ModelState::Uninitialized,
        }
    }

    pub fn status(&self) -> ModelStatus {
        match self.state {
            ModelState::Uninitialized => ModelStatus::Uninitialized,
            ModelState::Ready(_) => ModelStatus::Ready,
            ModelState::Failed(_) => ModelStatus::Failed,
        }
    }

    fn ensure_loaded(&mut self) -> Result<&dyn SummaryModel, SummarizeError> {
        if !matches!(self.state, ModelState::Ready(_)) {
            if let ModelState::Failed(prev) = &self.state {
                debug!(loader = self.loader.name(), previous = %prev, "retrying model load");
            }
            counter!("summarizer_loads_total").increment(1);
            match self.loader.load() {
                Ok(model) => {
                    info!(model = model.name(), "summarization model ready");
                    self.state = ModelState::Ready(model);
                }
                Err(e) => {
                    self.state = ModelState::Failed(e.to_string());
                    return Err(e);
                }
            }
        }
        match &self.state {
            ModelState::Ready(model) => Ok(model.as_ref()),
            _ => Err(SummarizeError::Load("model unavailable".into())),
        }
    }

    /// Summarize one article. Short texts bypass the model; an empty model
    /// output is returned as `""` and left for the caller's length gate.
    pub async fn summarize(&mut self, title: &str, text: &str) -> Result<String, SummarizeError> {
        let (input, params) = match prepare_input(title, text) {
            PreparedInput::PassThrough(t) => return Ok(t),
            PreparedInput::Model { text, params } => (text, params),
        };

        let mut last = String::new();
        for attempt in 1..=MAX_SUMMARY_ATTEMPTS {
            let result = match self.ensure_loaded() {
                Ok(model) => model.summarize(&input, &params).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(summary) => {
                    let summary = summary.trim().to_string();
                    debug!(attempt, words = word_count(&summary), "summary generated");
                    return Ok(summary);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "summarization attempt failed");
                    if matches!(e, SummarizeError::Model(_)) {
                        self.state = ModelState::Uninitialized;
                    }
                    last = e.to_string();
                }
            }
        }
        Err(SummarizeError::Exhausted {
            attempts: MAX_SUMMARY_ATTEMPTS,
            last,
        })
    }
}
