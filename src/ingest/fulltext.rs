// src/ingest/fulltext.rs
//! Full article text for summarization.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;

use crate::fingerprint::{clean_text, truncate_words, word_count};

/// Extracted text is cut to this many words.
pub const MAX_ARTICLE_WORDS: usize = 600;

#[async_trait]
pub trait ArticleFetcher: Send + Sync {
    async fn fetch_full_text(&self, url: &str) -> Result<String>;
}

pub struct HttpArticleFetcher {
    client: reqwest::Client,
    max_words: usize,
}

impl HttpArticleFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (compatible; news-relay)")
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(20))
            .build()
            .context("building article http client")?;
        Ok(Self {
            client,
            max_words: MAX_ARTICLE_WORDS,
        })
    }

    pub fn with_max_words(mut self, max_words: usize) -> Self {
        self.max_words = max_words;
        self
    }
}

#[async_trait]
impl ArticleFetcher for HttpArticleFetcher {
    async fn fetch_full_text(&self, url: &str) -> Result<String> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("article http get {url}"))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow!("article {url} returned HTTP {status}"));
        }
        let html = resp.text().await.context("article http .text()")?;
        let text = extract_article_text(&html, self.max_words);
        tracing::debug!(%url, words = word_count(&text), "article text extracted");
        Ok(text)
    }
}

fn selector(cell: &'static OnceCell<Selector>, css: &str) -> &'static Selector {
    cell.get_or_init(|| Selector::parse(css).unwrap())
}

/// Text nodes under `el`, skipping anything inside script-like elements.
/// Inline content joins with `""`, block-level fallbacks with `" "`.
fn visible_text(el: ElementRef<'_>, sep: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for node in el.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .ancestors()
            .filter_map(|a| a.value().as_element())
            .any(|e| matches!(e.name(), "script" | "style" | "noscript" | "template"));
        if !hidden {
            parts.push(&**text);
        }
    }
    parts.join(sep)
}

/// Paragraph text of an HTML page, falling back to all visible body text when
/// the page has no `<p>` content. Cut to `max_words`.
pub fn extract_article_text(html: &str, max_words: usize) -> String {
    static SEL_P: OnceCell<Selector> = OnceCell::new();
    static SEL_BODY: OnceCell<Selector> = OnceCell::new();

    let doc = Html::parse_document(html);
    let paragraphs: Vec<String> = doc
        .select(selector(&SEL_P, "p"))
        .map(|p| clean_text(&visible_text(p, "")))
        .filter(|p| !p.is_empty())
        .collect();

    let text = if paragraphs.is_empty() {
        doc.select(selector(&SEL_BODY, "body"))
            .next()
            .map(|b| clean_text(&visible_text(b, " ")))
            .unwrap_or_default()
    } else {
        paragraphs.join(" ")
    };

    truncate_words(&text, max_words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraphs_are_joined_and_cleaned() {
        let html = r#"<html><head><title>x</title></head><body>
            <nav>Menu</nav>
            <p class="lead">First <b>para</b>&nbsp;here.</p>
            <p></p>
            <P>Second para.</P>
        </body></html>"#;
        assert_eq!(extract_article_text(html, 100), "First para here. Second para.");
    }

    #[test]
    fn falls_back_to_body_without_paragraphs() {
        let html = "<html><body><script>x()</script><div>Only div text</div></body></html>";
        assert_eq!(extract_article_text(html, 100), "Only div text");
    }

    #[test]
    fn commented_out_and_script_text_is_ignored() {
        let html = r#"<html><body>
            <!-- <p>Draft paragraph that was never published.</p> -->
            <p>Visible <script>track("x")</script>story text.</p>
            <pre>code sample</pre>
        </body></html>"#;
        assert_eq!(extract_article_text(html, 100), "Visible story text.");
    }

    #[test]
    fn fragment_without_body_tag_still_yields_text() {
        assert_eq!(extract_article_text("<div>Loose text</div>", 100), "Loose text");
        assert_eq!(extract_article_text("", 100), "");
    }

    #[test]
    fn output_is_word_capped() {
        let html = format!("<p>{}</p>", vec!["word"; 50].join(" "));
        assert_eq!(word_count(&extract_article_text(&html, 10)), 10);
    }
}
