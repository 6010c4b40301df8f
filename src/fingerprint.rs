// src/fingerprint.rs
//! Identity keys for duplicate detection plus the small text helpers shared by
//! ingest, summarization and delivery.
//!
//! Three independent keys are derived per article:
//! - normalized title (markup stripped, lowercased, venue suffix removed)
//! - normalized URL (scheme + host + path, no query/fragment)
//! - content hash (SHA-256 over cleaned, lowercased summary text)
//!
//! Everything here is pure and deterministic; no I/O.

use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

fn re_tags() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").unwrap())
}

fn re_script_style() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>").unwrap())
}

fn re_ws() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

fn re_venue_suffix() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r" - [\w\s]+$| \| [\w\s]+$").unwrap())
}

/// Markup-free text: scripts/styles dropped, tags removed, entities decoded.
/// Whitespace is left as-is.
fn strip_markup(raw: &str) -> String {
    let no_code = re_script_style().replace_all(raw, " ");
    let no_tags = re_tags().replace_all(&no_code, "");
    html_escape::decode_html_entities(&no_tags).into_owned()
}

/// Strip markup and collapse whitespace runs to a single space.
pub fn clean_text(raw: &str) -> String {
    let text = strip_markup(raw);
    re_ws().replace_all(&text, " ").trim().to_string()
}

/// Scheme + host (+ port) + path. Query string and fragment are dropped so that
/// tracking parameters do not defeat URL matching.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }
    match Url::parse(url) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or_default();
            let port = parsed.port().map(|p| format!(":{p}")).unwrap_or_default();
            format!("{}://{}{}{}", parsed.scheme(), host, port, parsed.path())
        }
        Err(_) => {
            // Relative or malformed: plain string surgery.
            let s = url.split('#').next().unwrap_or_default();
            s.split('?').next().unwrap_or_default().to_string()
        }
    }
}

/// Title used for comparison only. Lowercased and stripped of a trailing
/// " - Venue" / " | Venue" suffix, so it is unfit for display.
pub fn normalize_title_for_matching(title: &str) -> String {
    let text = strip_markup(title).trim().to_lowercase();
    re_venue_suffix().replace(&text, "").into_owned()
}

/// Title used in user-facing text: markup stripped and trimmed, nothing else.
pub fn normalize_title_for_display(title: &str) -> String {
    strip_markup(title).trim().to_string()
}

/// SHA-256 hex digest of the cleaned, lowercased text.
/// `None` for empty input or input that is nothing but markup.
pub fn content_hash(text: &str) -> Option<String> {
    if text.trim().is_empty() {
        return None;
    }
    let cleaned = clean_text(text).to_lowercase();
    if cleaned.is_empty() {
        return None;
    }
    let digest = Sha256::digest(cleaned.as_bytes());
    let mut out = String::with_capacity(64);
    for b in digest.iter() {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    Some(out)
}

/// Host part of a URL, or an empty string when it cannot be parsed.
pub fn extract_source_from_url(url: &str) -> String {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_default()
}

/// Up to `max` most frequent alphabetic tokens longer than four characters.
/// Ties keep first-occurrence order.
pub fn extract_keywords(text: &str, max: usize) -> Vec<String> {
    let lowered = clean_text(text).to_lowercase();
    let mut counts: Vec<(String, usize)> = Vec::new();
    for token in lowered.split(|c: char| !c.is_alphabetic()) {
        if token.chars().count() <= 4 {
            continue;
        }
        match counts.iter_mut().find(|(t, _)| t == token) {
            Some((_, n)) => *n += 1,
            None => counts.push((token.to_string(), 1)),
        }
    }
    // stable sort keeps first-seen order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(max).map(|(t, _)| t).collect()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// First `max_words` whitespace-separated words, re-joined with single spaces.
pub fn truncate_words(text: &str, max_words: usize) -> String {
    if word_count(text) <= max_words {
        return text.to_string();
    }
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_drops_query_and_fragment() {
        assert_eq!(
            normalize_url("https://news.example.com/a/b?utm_source=x&id=2#top"),
            "https://news.example.com/a/b"
        );
        assert_eq!(
            normalize_url("http://example.com:8080/x?y=1"),
            "http://example.com:8080/x"
        );
        assert_eq!(normalize_url("   "), "");
    }

    #[test]
    fn title_matching_strips_case_markup_and_suffix() {
        assert_eq!(
            normalize_title_for_matching("<b>Markets Rally</b> - Reuters"),
            "markets rally"
        );
        assert_eq!(
            normalize_title_for_matching("Markets rally | The Daily Wire"),
            "markets rally"
        );
        // a dash inside the headline is not a venue suffix when punctuation follows
        assert_eq!(
            normalize_title_for_matching("Rates - what's next?"),
            "rates - what's next?"
        );
    }

    #[test]
    fn display_title_keeps_case_and_suffix() {
        assert_eq!(
            normalize_title_for_display("  <i>Markets Rally</i> - Reuters "),
            "Markets Rally - Reuters"
        );
    }

    #[test]
    fn hash_ignores_markup_whitespace_and_case() {
        let a = content_hash("The Fed held rates steady.").unwrap();
        let b = content_hash("  <p>The   FED held\n rates <b>steady</b>.</p> ").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn hash_is_none_for_empty_or_pure_markup() {
        assert!(content_hash("").is_none());
        assert!(content_hash("   \n").is_none());
        assert!(content_hash("<p></p><br/>").is_none());
    }

    #[test]
    fn clean_text_decodes_entities_and_drops_scripts() {
        let out = clean_text("<script>var x=1;</script>Hello&nbsp;&amp; <b>world</b>");
        assert_eq!(out, "Hello & world");
    }

    #[test]
    fn keywords_are_long_frequent_tokens() {
        let kws = extract_keywords(
            "Inflation cools. Inflation data surprised markets; markets rallied on inflation.",
            2,
        );
        assert_eq!(kws, vec!["inflation".to_string(), "markets".to_string()]);
    }

    #[test]
    fn truncate_keeps_first_words() {
        assert_eq!(truncate_words("a b  c d", 2), "a b");
        assert_eq!(truncate_words("a b", 5), "a b");
    }

    #[test]
    fn source_is_host() {
        assert_eq!(
            extract_source_from_url("https://www.bbc.co.uk/news/x?y"),
            "www.bbc.co.uk"
        );
        assert_eq!(extract_source_from_url("not a url"), "");
    }
}
