// tests/config_env.rs
use std::{env, fs};

use news_relay::config::{AppConfig, SummarizerKind};
use serial_test::serial;

const KEYS: &[&str] = &[
    "RSS_FEED_URL",
    "RSS_COUNTRY_MAPPINGS",
    "FEEDS_CONFIG_PATH",
    "TELEGRAM_BOT_TOKEN",
    "TELEGRAM_CHAT_ID",
    "TEAMS_WEBHOOK_URL",
    "POSTED_NEWS_FILE",
    "SKIPPED_NEWS_FILE",
    "LOCK_FILE",
    "FEED_TIME_RANGE_DAYS",
    "SUMMARIZER",
    "OPENAI_API_KEY",
    "RECORD_REJECTIONS",
    "ANNOUNCE_RUN_START",
    "METRICS_TEXTFILE",
];

/// Sets/removes env vars and restores the previous values on drop.
struct EnvSnapshot {
    saved: Vec<(String, Option<String>)>,
}

impl EnvSnapshot {
    /// Clears every config key, then applies `pairs`.
    fn set(pairs: &[(&str, &str)]) -> Self {
        let saved = KEYS
            .iter()
            .map(|k| (k.to_string(), env::var(k).ok()))
            .collect();
        for k in KEYS {
            env::remove_var(k);
        }
        for (k, v) in pairs {
            env::set_var(k, v);
        }
        Self { saved }
    }
}

impl Drop for EnvSnapshot {
    fn drop(&mut self) {
        for (k, maybe_v) in self.saved.drain(..) {
            match maybe_v {
                Some(v) => env::set_var(&k, v),
                None => env::remove_var(&k),
            }
        }
    }
}

#[serial]
#[test]
fn env_only_configuration() {
    let _env = EnvSnapshot::set(&[
        ("RSS_FEED_URL", "https://a.test/rss, https://b.test/feed"),
        ("RSS_COUNTRY_MAPPINGS", "https://a.test/rss:Israel,https://b.test/feed:USA"),
        ("TELEGRAM_BOT_TOKEN", "123:abc"),
        ("TELEGRAM_CHAT_ID", "-100"),
        ("POSTED_NEWS_FILE", "data/posted.json"),
        ("METRICS_TEXTFILE", "/tmp/news_relay.prom"),
    ]);
    let cfg = AppConfig::from_env().unwrap();
    let labels: Vec<_> = cfg.feeds.iter().map(|f| f.label.as_str()).collect();
    assert_eq!(labels, vec!["Israel", "USA"]);
    assert_eq!(cfg.posted_file.to_str(), Some("data/posted.json"));
    assert_eq!(cfg.notifiers().channel_names(), vec!["telegram"]);
    assert_eq!(cfg.summarizer, SummarizerKind::Extractive);
    assert!(cfg.metrics_textfile.is_some());
}

#[serial]
#[test]
fn feeds_file_merges_with_env_list() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feeds.toml");
    fs::write(
        &path,
        r#"
[[feeds]]
url = "https://file.test/rss"
label = "Germany"

[[feeds]]
url = "https://a.test/rss"
label = "FromFile"
"#,
    )
    .unwrap();
    let _env = EnvSnapshot::set(&[
        ("FEEDS_CONFIG_PATH", path.to_str().unwrap()),
        ("RSS_FEED_URL", "https://a.test/rss,https://c.test/rss"),
    ]);
    let cfg = AppConfig::from_env().unwrap();
    let urls: Vec<_> = cfg.feeds.iter().map(|f| (f.url.as_str(), f.label.as_str())).collect();
    assert_eq!(
        urls,
        vec![
            ("https://file.test/rss", "Germany"),
            ("https://a.test/rss", "FromFile"),
            ("https://c.test/rss", "Unknown"),
        ]
    );
}

#[serial]
#[test]
fn missing_feeds_or_bad_file_fail() {
    let _env = EnvSnapshot::set(&[]);
    assert!(AppConfig::from_env().is_err());
    drop(_env);

    let _env = EnvSnapshot::set(&[("FEEDS_CONFIG_PATH", "/nonexistent/feeds.toml")]);
    let err = AppConfig::from_env().unwrap_err();
    assert!(format!("{err:#}").contains("FEEDS_CONFIG_PATH"));
}
