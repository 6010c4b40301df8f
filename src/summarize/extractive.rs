// src/summarize/extractive.rs
//! Frequency-scored sentence extraction. Runs locally with no model weights.

use std::collections::HashMap;

use async_trait::async_trait;

use super::{ModelLoader, SummarizeError, SummaryModel, SummaryParams};
use crate::fingerprint::{truncate_words, word_count};

const STOPWORDS: &[&str] = &[
    "about", "after", "also", "been", "before", "being", "could", "from", "have", "into", "more",
    "most", "other", "over", "said", "says", "some", "such", "than", "that", "their", "them",
    "then", "there", "these", "they", "this", "those", "very", "were", "what", "when", "where",
    "which", "while", "will", "with", "would", "your",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractiveModel;

#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractiveLoader;

impl ModelLoader for ExtractiveLoader {
    fn load(&self) -> Result<Box<dyn SummaryModel>, SummarizeError> {
        Ok(Box::new(ExtractiveModel))
    }
    fn name(&self) -> &str {
        "extractive"
    }
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut cur: Vec<&str> = Vec::new();
    for w in text.split_whitespace() {
        cur.push(w);
        if w.ends_with(['.', '!', '?']) {
            out.push(cur.join(" "));
            cur.clear();
        }
    }
    if !cur.is_empty() {
        out.push(cur.join(" "));
    }
    out
}

fn terms(sentence: &str) -> impl Iterator<Item = String> + '_ {
    sentence
        .split(|c: char| !c.is_alphabetic())
        .filter(|t| t.chars().count() > 3)
        .map(|t| t.to_lowercase())
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
}

impl ExtractiveModel {
    /// Highest-scoring sentences, kept in document order, within
    /// `params.max_length` words and stopping once `params.min_length` is met.
    pub fn extract(&self, text: &str, params: &SummaryParams) -> String {
        let sentences = split_sentences(text);
        if sentences.is_empty() {
            return String::new();
        }

        let mut freq: HashMap<String, usize> = HashMap::new();
        for s in &sentences {
            for t in terms(s) {
                *freq.entry(t).or_default() += 1;
            }
        }

        let mut ranked: Vec<(usize, f64)> = sentences
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let n = word_count(s).max(1) as f64;
                let score: usize = terms(s).map(|t| freq.get(&t).copied().unwrap_or(0)).sum();
                (i, score as f64 / n.sqrt())
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let mut picked: Vec<usize> = Vec::new();
        let mut total = 0usize;
        for (i, _) in ranked {
            if total >= params.min_length {
                break;
            }
            let n = word_count(&sentences[i]);
            if total + n > params.max_length {
                continue;
            }
            picked.push(i);
            total += n;
        }
        if picked.is_empty() {
            return truncate_words(text, params.max_length);
        }
        picked.sort_unstable();
        picked
            .into_iter()
            .map(|i| sentences[i].as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait]
impl SummaryModel for ExtractiveModel {
    async fn summarize(
        &self,
        text: &str,
        params: &SummaryParams,
    ) -> Result<String, SummarizeError> {
        Ok(self.extract(text, params))
    }
    fn name(&self) -> &str {
        "extractive"
    }
}
