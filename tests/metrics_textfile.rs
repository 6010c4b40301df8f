// tests/metrics_textfile.rs
use news_relay::ingest::providers::rss::RssFeedProvider;
use news_relay::metrics::{install_recorder, write_textfile};

#[test]
fn textfile_contains_run_series() {
    let handle = install_recorder().unwrap();
    // second install returns the same handle instead of failing
    assert!(install_recorder().is_ok());

    let xml = include_str!("fixtures/feed_rss.xml");
    let p = RssFeedProvider::from_fixture(xml, "x").with_time_range(100_000);
    let items = p.parse_items_at(xml, chrono::Utc::now()).unwrap();
    assert!(!items.is_empty());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out/news_relay.prom");
    write_textfile(&handle, &path, 1234.0).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    for needle in [
        "ingest_events_total",
        "ingest_parse_ms",
        "run_last_duration_ms 1234",
        "run_last_timestamp",
    ] {
        assert!(text.contains(needle), "missing {needle} in:\n{text}");
    }
    assert!(!dir.path().join("out/news_relay.prom.tmp").exists());
}
