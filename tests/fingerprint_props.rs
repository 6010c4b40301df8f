// tests/fingerprint_props.rs
use news_relay::fingerprint::{
    content_hash, normalize_title_for_display, normalize_title_for_matching, normalize_url,
};

#[test]
fn hash_ignores_whitespace_case_and_markup() {
    let base = content_hash("Markets rallied after the announcement.").unwrap();
    let variants = [
        "  Markets   rallied after\nthe announcement.  ",
        "MARKETS RALLIED AFTER THE ANNOUNCEMENT.",
        "<p>Markets <b>rallied</b> after the <a href=\"x\">announcement</a>.</p>",
    ];
    for v in variants {
        assert_eq!(content_hash(v).as_deref(), Some(base.as_str()), "{v}");
    }
    assert_ne!(content_hash("Markets fell.").unwrap(), base);
}

#[test]
fn hash_is_null_for_empty_input() {
    assert_eq!(content_hash(""), None);
    assert_eq!(content_hash(" \n\t"), None);
}

#[test]
fn urls_differing_by_tracking_params_match() {
    assert_eq!(
        normalize_url("https://news.test/story/1?utm_source=tw&utm_medium=social#comments"),
        normalize_url("https://news.test/story/1")
    );
    assert_ne!(
        normalize_url("https://news.test/story/1"),
        normalize_url("https://news.test/story/2")
    );
}

#[test]
fn display_title_keeps_case_and_suffix() {
    let raw = "  <b>Budget</b> Passes - Reuters ";
    assert_eq!(normalize_title_for_display(raw), "Budget Passes - Reuters");
    assert_eq!(normalize_title_for_matching(raw), "budget passes");
}
