// src/ingest/config.rs
//! Feed list loading. Feeds come from a TOML/JSON file or from the
//! `RSS_FEED_URL` + `RSS_COUNTRY_MAPPINGS` environment variables.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const UNKNOWN_LABEL: &str = "Unknown";

/// One feed and the label attached to everything it yields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedSpec {
    pub url: String,
    #[serde(default = "unknown_label")]
    pub label: String,
}

fn unknown_label() -> String {
    UNKNOWN_LABEL.to_string()
}

/// Load feeds from an explicit path. Supports TOML or JSON formats:
/// - TOML: `[[feeds]]` tables with `url` and optional `label`
/// - JSON: an array of `{ "url": .., "label": .. }` objects or plain URL strings
pub fn load_feeds_from(path: &Path) -> Result<Vec<FeedSpec>> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading feeds from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_feeds(&content, ext.as_str())
}

fn parse_feeds(s: &str, hint_ext: &str) -> Result<Vec<FeedSpec>> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || s.contains("[[feeds]]");
    if try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    if let Ok(v) = parse_json(s) {
        return Ok(v);
    }
    if !try_toml {
        if let Ok(v) = parse_toml(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported feeds file format"))
}

fn parse_toml(s: &str) -> Result<Vec<FeedSpec>> {
    #[derive(Deserialize)]
    struct TomlFeeds {
        feeds: Vec<FeedSpec>,
    }
    let v: TomlFeeds = toml::from_str(s)?;
    Ok(clean_list(v.feeds))
}

fn parse_json(s: &str) -> Result<Vec<FeedSpec>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum JsonFeed {
        Url(String),
        Spec(FeedSpec),
    }
    let v: Vec<JsonFeed> = serde_json::from_str(s)?;
    Ok(clean_list(
        v.into_iter()
            .map(|f| match f {
                JsonFeed::Url(url) => FeedSpec {
                    url,
                    label: unknown_label(),
                },
                JsonFeed::Spec(spec) => spec,
            })
            .collect(),
    ))
}

/// Trim, drop empties and repeated URLs (first occurrence wins).
fn clean_list(items: Vec<FeedSpec>) -> Vec<FeedSpec> {
    let mut out: Vec<FeedSpec> = Vec::with_capacity(items.len());
    for it in items {
        let url = it.url.trim();
        if url.is_empty() || out.iter().any(|f| f.url == url) {
            continue;
        }
        let label = match it.label.trim() {
            "" => unknown_label(),
            l => l.to_string(),
        };
        out.push(FeedSpec {
            url: url.to_string(),
            label,
        });
    }
    out
}

/// `url1:label1,url2:label2`. URLs contain colons themselves, so each pair is
/// split on its last colon.
pub fn parse_label_mappings(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (url, label) = pair.rsplit_once(':')?;
            let (url, label) = (url.trim(), label.trim());
            if url.is_empty() || label.is_empty() || label.starts_with("//") {
                return None;
            }
            Some((url.to_string(), label.to_string()))
        })
        .collect()
}

/// Comma-separated feed URLs, labelled through `mappings`.
pub fn feeds_from_list(urls: &str, mappings: &HashMap<String, String>) -> Vec<FeedSpec> {
    clean_list(
        urls.split(',')
            .map(|u| FeedSpec {
                url: u.trim().to_string(),
                label: mappings
                    .get(u.trim())
                    .cloned()
                    .unwrap_or_else(unknown_label),
            })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_and_json_forms() {
        let toml = r#"
[[feeds]]
url = " https://a.test/rss "
label = "IL"

[[feeds]]
url = "https://b.test/rss"

[[feeds]]
url = "https://a.test/rss"
label = "dup"
"#;
        let v = parse_toml(toml).unwrap();
        assert_eq!(
            v,
            vec![
                FeedSpec {
                    url: "https://a.test/rss".into(),
                    label: "IL".into()
                },
                FeedSpec {
                    url: "https://b.test/rss".into(),
                    label: "Unknown".into()
                },
            ]
        );

        let json = r#"["https://c.test/rss", {"url": "https://d.test/rss", "label": "US"}, ""]"#;
        let v = parse_json(json).unwrap();
        assert_eq!(v.len(), 2);
        assert_eq!(v[1].label, "US");
    }

    #[test]
    fn mappings_split_on_last_colon() {
        let m = parse_label_mappings("https://a.test/rss:Israel, https://b.test/x:USA ,junk");
        assert_eq!(m.get("https://a.test/rss").map(String::as_str), Some("Israel"));
        assert_eq!(m.get("https://b.test/x").map(String::as_str), Some("USA"));
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn bare_url_is_not_mistaken_for_mapping() {
        // "https" + "//a.test/rss" would be a bogus pair
        assert!(parse_label_mappings("https://a.test/rss").is_empty());
    }

    #[test]
    fn list_uses_mappings() {
        let m = parse_label_mappings("https://a.test/rss:IL");
        let feeds = feeds_from_list("https://a.test/rss, https://b.test/rss,,", &m);
        assert_eq!(feeds.len(), 2);
        assert_eq!(feeds[0].label, "IL");
        assert_eq!(feeds[1].label, "Unknown");
    }
}
