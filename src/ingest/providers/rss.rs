// src/ingest/providers/rss.rs
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use std::time::Duration;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;
use url::Url;

use crate::fingerprint::{
    clean_text, content_hash, extract_keywords, extract_source_from_url, word_count,
};
use crate::ingest::types::{synthesize_id, whole_seconds, CandidateArticle, FeedProvider};

/// Feed summaries shorter than this are dropped at retrieval.
pub const MIN_FEED_SUMMARY_WORDS: usize = 10;
pub const KEYWORDS_PER_ARTICLE: usize = 5;

// --- RSS 2.0 ---

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<TextNode>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

// --- Atom (Google Alerts and friends) ---

#[derive(Debug, Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    id: Option<String>,
    title: Option<TextNode>,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
    summary: Option<TextNode>,
    content: Option<TextNode>,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// Element whose attributes we ignore and whose text we keep.
#[derive(Debug, Deserialize, Default)]
struct TextNode {
    #[serde(rename = "$text", default)]
    value: String,
}

/// Feed-format-independent view of one entry.
#[derive(Debug, Default)]
struct RawEntry {
    id: Option<String>,
    title: Option<String>,
    link: Option<String>,
    published: Option<String>,
    summary: Option<String>,
}

fn parse_timestamp(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    OffsetDateTime::parse(ts, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .ok()
        .and_then(|dt| DateTime::<Utc>::from_timestamp(dt.unix_timestamp(), 0))
        // chrono is more forgiving about legacy zone names ("EST", "Z")
        .or_else(|| {
            DateTime::parse_from_rfc2822(ts)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        })
}

/// Aggregators wrap the real link in a redirector (`...?url=<target>`).
fn unwrap_redirect(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(k, _)| k == "url")
                .map(|(_, v)| v.into_owned())
        })
        .unwrap_or_else(|| raw.to_string())
}

fn parse_entries(xml: &str) -> Result<Vec<RawEntry>> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    if let Ok(rss) = from_str::<Rss>(&xml_clean) {
        return Ok(rss
            .channel
            .item
            .into_iter()
            .map(|it| RawEntry {
                id: it.guid.map(|g| g.value).filter(|s| !s.trim().is_empty()),
                title: it.title,
                link: it.link,
                published: it.pub_date,
                summary: it.description,
            })
            .collect());
    }
    let atom: AtomFeed = from_str(&xml_clean).context("parsing feed xml (neither RSS nor Atom)")?;
    Ok(atom
        .entry
        .into_iter()
        .map(|e| {
            let link = e
                .links
                .iter()
                .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
                .or_else(|| e.links.first())
                .and_then(|l| l.href.clone());
            RawEntry {
                id: e.id.filter(|s| !s.trim().is_empty()),
                title: e.title.map(|t| t.value),
                link,
                published: e.published.or(e.updated),
                summary: e.summary.or(e.content).map(|t| t.value),
            }
        })
        .collect())
}

/// Why an entry did not become a candidate.
#[derive(Debug, PartialEq, Eq)]
enum Dropped {
    OutOfRange,
    MissingIdentity,
    SummaryTooShort(usize),
}

fn build_candidate(
    raw: RawEntry,
    label: &str,
    now: DateTime<Utc>,
    time_range_days: i64,
) -> std::result::Result<CandidateArticle, Dropped> {
    let id = raw.id.unwrap_or_else(|| synthesize_id(now));
    let title = raw.title.as_deref().map(clean_text).unwrap_or_default();
    let url = raw
        .link
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(unwrap_redirect)
        .unwrap_or_default();
    let summary = raw.summary.as_deref().map(clean_text).unwrap_or_default();
    let published = raw
        .published
        .as_deref()
        .and_then(parse_timestamp)
        .unwrap_or(now);

    let today = now.date_naive();
    // saturates for windows reaching past the calendar range
    let start = today
        .checked_sub_days(Days::new(time_range_days.max(0) as u64))
        .unwrap_or(NaiveDate::MIN);
    let day = published.date_naive();
    if day < start || day > today {
        return Err(Dropped::OutOfRange);
    }
    if title.is_empty() || url.is_empty() {
        return Err(Dropped::MissingIdentity);
    }
    let words = word_count(&summary);
    if words < MIN_FEED_SUMMARY_WORDS {
        return Err(Dropped::SummaryTooShort(words));
    }

    Ok(CandidateArticle {
        id,
        source: extract_source_from_url(&url),
        keywords: extract_keywords(&summary, KEYWORDS_PER_ARTICLE),
        text_hash: content_hash(&summary),
        title,
        url,
        summary,
        published_date: day,
        published_time: whole_seconds(published.time()),
        rss_source: label.to_string(),
    })
}

/// RSS/Atom feed, fetched over HTTP or parsed from a fixture.
pub struct RssFeedProvider {
    name: String,
    label: String,
    time_range_days: i64,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssFeedProvider {
    pub fn from_url(url: &str, label: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("news-relay/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .context("building feed http client")?;
        Ok(Self {
            name: url.to_string(),
            label: label.to_string(),
            time_range_days: 1,
            mode: Mode::Http {
                url: url.to_string(),
                client,
            },
        })
    }

    pub fn from_fixture(content: &str, label: &str) -> Self {
        Self {
            name: format!("fixture:{label}"),
            label: label.to_string(),
            time_range_days: 1,
            mode: Mode::Fixture(content.to_string()),
        }
    }

    /// Accept entries published up to `days` before today (inclusive).
    pub fn with_time_range(mut self, days: i64) -> Self {
        self.time_range_days = days.max(0);
        self
    }

    /// Parse a feed document as of `now`.
    pub fn parse_items_at(&self, xml: &str, now: DateTime<Utc>) -> Result<Vec<CandidateArticle>> {
        let t0 = std::time::Instant::now();
        let entries = parse_entries(xml)?;
        let total = entries.len();

        let mut out = Vec::with_capacity(total);
        let mut invalid = 0usize;
        for raw in entries {
            match build_candidate(raw, &self.label, now, self.time_range_days) {
                Ok(c) => out.push(c),
                Err(Dropped::OutOfRange) => {}
                Err(reason) => {
                    tracing::debug!(feed = %self.name, ?reason, "feed entry dropped");
                    invalid += 1;
                }
            }
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_parse_ms").record(ms);
        counter!("ingest_events_total").increment(out.len() as u64);
        tracing::info!(feed = %self.name, total, kept = out.len(), invalid, "feed parsed");
        Ok(out)
    }
}

#[async_trait]
impl FeedProvider for RssFeedProvider {
    async fn fetch_latest(&self) -> Result<Vec<CandidateArticle>> {
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_at(s, Utc::now()),
            Mode::Http { url, client } => {
                let resp = client
                    .get(url.as_str())
                    .send()
                    .await
                    .with_context(|| format!("feed http get {url}"))?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(anyhow!("feed {url} returned HTTP {status}"));
                }
                let body = resp.text().await.context("feed http .text()")?;
                self.parse_items_at(&body, Utc::now())
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// quick-xml knows only the five XML entities; feeds routinely use HTML ones.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}
